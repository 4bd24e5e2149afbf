//! Packaging fetched repositories into single files

use async_trait::async_trait;
use ghvault_common::{Result, VaultError};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Turns a directory into one uploadable file
#[async_trait]
pub trait Packager: Send + Sync {
    /// Package `source` into `dest`; returns the package size in bytes
    ///
    /// No partial package is left behind on failure.
    async fn package(&self, source: &Path, dest: &Path) -> Result<u64>;
}

/// Deflate-compressed zip with entries relative to the packaged directory
#[derive(Debug, Clone, Default)]
pub struct ZipPackager;

impl ZipPackager {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Packager for ZipPackager {
    #[instrument(skip(self), fields(source = %source.display()))]
    async fn package(&self, source: &Path, dest: &Path) -> Result<u64> {
        let source = source.to_path_buf();
        let dest_owned = dest.to_path_buf();

        let result = tokio::task::spawn_blocking(move || zip_dir(&source, &dest_owned))
            .await
            .map_err(|e| VaultError::provider("package", format!("packaging task failed: {}", e)))?;

        match result {
            Ok(size) => {
                debug!(size, "Package written");
                Ok(size)
            },
            Err(e) => {
                if dest.exists() {
                    if let Err(remove_err) = tokio::fs::remove_file(dest).await {
                        warn!(path = %dest.display(), error = %remove_err, "Failed to remove partial package");
                    }
                }
                Err(e)
            },
        }
    }
}

fn zip_dir(source: &Path, dest: &Path) -> Result<u64> {
    if !source.is_dir() {
        return Err(VaultError::provider(
            "package",
            format!("{} is not a directory", source.display()),
        ));
    }

    let mut writer = ZipWriter::new(BufWriter::new(File::create(dest)?));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry.map_err(|e| VaultError::provider("package", e))?;
        let path = entry.path();

        let relative = path
            .strip_prefix(source)
            .map_err(|e| VaultError::provider("package", e))?;
        if relative.as_os_str().is_empty() {
            continue;
        }

        let name = entry_name(relative);

        if entry.file_type().is_dir() {
            writer
                .add_directory(name, options)
                .map_err(|e| VaultError::provider("package", e))?;
        } else {
            let len = entry.metadata().map_err(|e| VaultError::provider("package", e))?.len();
            writer
                .start_file(name, options.large_file(len >= u32::MAX as u64))
                .map_err(|e| VaultError::provider("package", e))?;

            let mut file = File::open(path)?;
            std::io::copy(&mut file, &mut writer)?;
        }
    }

    writer
        .finish()
        .map_err(|e| VaultError::provider("package", e))?;

    Ok(std::fs::metadata(dest)?.len())
}

/// Zip entry names always use `/`
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
