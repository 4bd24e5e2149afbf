//! Terminal output helpers
//!
//! Spinners for the long waits and the end-of-run summary.

use colored::Colorize;
use ghvault_engine::RunSummary;
use indicatif::{ProgressBar, ProgressStyle};

/// Create a spinner for indeterminate operations
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Format bytes into human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Render the summary of a backup run
pub fn render_summary(summary: &RunSummary) -> Vec<String> {
    let mut lines = vec![format!("{} repositories listed", summary.seen)];

    if summary.skipped_uploaded > 0 {
        lines.push(format!("{} already archived", summary.skipped_uploaded));
    }
    if summary.skipped_archived > 0 {
        lines.push(format!("{} skipped (archived on GitHub)", summary.skipped_archived));
    }

    lines.push(
        format!("{} uploaded ({})", summary.uploaded, format_bytes(summary.uploaded_bytes))
            .green()
            .to_string(),
    );

    if summary.is_success() {
        return lines;
    }

    if summary.stages_crashed > 0 {
        lines.push(
            format!("{} pipeline stage(s) stopped unexpectedly; see the log", summary.stages_crashed)
                .red()
                .to_string(),
        );
    }

    if summary.failed() > 0 {
        lines.push(
            format!(
                "{} failed (fetch {}, package {}, upload {}); run again to retry",
                summary.failed(),
                summary.fetch_failed,
                summary.package_failed,
                summary.upload_failed
            )
            .red()
            .to_string(),
        );
    }

    lines
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(314_572_800), "300.00 MB");
        assert_eq!(format_bytes(1_099_511_627_776), "1.00 TB");
    }

    #[test]
    fn test_create_spinner() {
        let pb = create_spinner("Waiting...");
        assert!(!pb.is_finished());
        pb.finish_and_clear();
    }

    #[test]
    fn test_render_summary_mentions_failures() {
        colored::control::set_override(false);

        let summary = RunSummary {
            seen: 5,
            skipped_uploaded: 1,
            uploaded: 3,
            uploaded_bytes: 1536,
            upload_failed: 1,
            ..RunSummary::default()
        };

        let lines = render_summary(&summary);

        assert_eq!(lines[0], "5 repositories listed");
        assert!(lines.contains(&"1 already archived".to_string()));
        assert!(lines.contains(&"3 uploaded (1.50 KB)".to_string()));
        assert!(lines
            .last()
            .unwrap()
            .starts_with("1 failed (fetch 0, package 0, upload 1)"));
    }

    #[test]
    fn test_render_summary_reports_crashed_stage() {
        colored::control::set_override(false);

        let summary = RunSummary {
            seen: 2,
            uploaded: 1,
            stages_crashed: 1,
            ..RunSummary::default()
        };

        let lines = render_summary(&summary);

        assert_eq!(lines.len(), 3);
        assert!(lines[2].contains("stopped unexpectedly"));
    }
}
