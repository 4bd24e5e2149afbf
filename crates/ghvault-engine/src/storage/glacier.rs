use super::{ByteRange, ColdStorage, JobOutput, JobSummary};
use crate::config::AwsConfig;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_glacier::{error::DisplayErrorContext, primitives::ByteStream, types::JobParameters, Client};
use ghvault_common::{Result, VaultError};
use tracing::{debug, info, instrument};

/// Glacier retrieval job type for whole archives
const ARCHIVE_RETRIEVAL: &str = "archive-retrieval";

/// AWS Glacier vault client
#[derive(Clone)]
pub struct GlacierStorage {
    client: Client,
    account_id: String,
    vault: String,
}

impl GlacierStorage {
    /// Create a client for `vault` using the configured credentials
    pub async fn new(config: &AwsConfig, vault: impl Into<String>) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            config.session_token.clone(),
            None,
            "ghvault-config",
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);

        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;
        let vault = vault.into();

        info!(vault = %vault, region = %config.region, "Glacier client initialized");

        Self {
            client: Client::new(&sdk_config),
            account_id: config.account_id.clone(),
            vault,
        }
    }

    pub fn vault(&self) -> &str {
        &self.vault
    }
}

fn sdk_error<E>(operation: &str, err: E) -> VaultError
where
    E: std::error::Error + Send + Sync + 'static,
{
    VaultError::provider(operation, DisplayErrorContext(err))
}

fn missing(operation: &str, field: &str) -> VaultError {
    VaultError::provider(operation, format!("response did not contain {}", field))
}

#[async_trait]
impl ColdStorage for GlacierStorage {
    #[instrument(skip(self))]
    async fn create_vault(&self) -> Result<()> {
        self.client
            .create_vault()
            .account_id(&self.account_id)
            .vault_name(&self.vault)
            .send()
            .await
            .map_err(|e| sdk_error("create vault", e))?;

        debug!("Vault ready");
        Ok(())
    }

    #[instrument(skip(self, body), fields(size = body.len()))]
    async fn upload_archive(
        &self,
        body: Vec<u8>,
        description: &str,
        checksum: &str,
    ) -> Result<String> {
        let output = self
            .client
            .upload_archive()
            .account_id(&self.account_id)
            .vault_name(&self.vault)
            .archive_description(description)
            .checksum(checksum)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| sdk_error("upload archive", e))?;

        output
            .archive_id()
            .map(str::to_string)
            .ok_or_else(|| missing("upload archive", "an archive id"))
    }

    #[instrument(skip(self))]
    async fn initiate_multipart_upload(
        &self,
        description: &str,
        part_size: u64,
    ) -> Result<String> {
        let output = self
            .client
            .initiate_multipart_upload()
            .account_id(&self.account_id)
            .vault_name(&self.vault)
            .archive_description(description)
            .part_size(part_size.to_string())
            .send()
            .await
            .map_err(|e| sdk_error("initiate multipart upload", e))?;

        output
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| missing("initiate multipart upload", "an upload id"))
    }

    #[instrument(skip(self, body), fields(range = %range.content_range()))]
    async fn upload_part(
        &self,
        upload_id: &str,
        range: ByteRange,
        body: Vec<u8>,
        checksum: &str,
    ) -> Result<()> {
        self.client
            .upload_multipart_part()
            .account_id(&self.account_id)
            .vault_name(&self.vault)
            .upload_id(upload_id)
            .range(range.content_range())
            .checksum(checksum)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| sdk_error("upload part", e))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn complete_multipart_upload(
        &self,
        upload_id: &str,
        archive_size: u64,
        checksum: &str,
    ) -> Result<String> {
        let output = self
            .client
            .complete_multipart_upload()
            .account_id(&self.account_id)
            .vault_name(&self.vault)
            .upload_id(upload_id)
            .archive_size(archive_size.to_string())
            .checksum(checksum)
            .send()
            .await
            .map_err(|e| sdk_error("complete multipart upload", e))?;

        output
            .archive_id()
            .map(str::to_string)
            .ok_or_else(|| missing("complete multipart upload", "an archive id"))
    }

    #[instrument(skip(self))]
    async fn abort_multipart_upload(&self, upload_id: &str) -> Result<()> {
        self.client
            .abort_multipart_upload()
            .account_id(&self.account_id)
            .vault_name(&self.vault)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| sdk_error("abort multipart upload", e))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn initiate_retrieval_job(&self, archive_id: &str) -> Result<String> {
        let parameters = JobParameters::builder()
            .r#type(ARCHIVE_RETRIEVAL)
            .archive_id(archive_id)
            .build();

        let output = self
            .client
            .initiate_job()
            .account_id(&self.account_id)
            .vault_name(&self.vault)
            .job_parameters(parameters)
            .send()
            .await
            .map_err(|e| sdk_error("initiate retrieval job", e))?;

        output
            .job_id()
            .map(str::to_string)
            .ok_or_else(|| missing("initiate retrieval job", "a job id"))
    }

    #[instrument(skip(self))]
    async fn list_jobs(&self) -> Result<Vec<JobSummary>> {
        let mut jobs = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let output = self
                .client
                .list_jobs()
                .account_id(&self.account_id)
                .vault_name(&self.vault)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| sdk_error("list jobs", e))?;

            jobs.extend(output.job_list().iter().filter_map(|job| {
                job.job_id().map(|id| JobSummary {
                    job_id: id.to_string(),
                    completed: job.completed(),
                })
            }));

            match output.marker() {
                Some(next) if !next.is_empty() => marker = Some(next.to_string()),
                _ => break,
            }
        }

        debug!(jobs = jobs.len(), "Listed vault jobs");
        Ok(jobs)
    }

    #[instrument(skip(self))]
    async fn fetch_job_output(&self, job_id: &str) -> Result<JobOutput> {
        let output = self
            .client
            .get_job_output()
            .account_id(&self.account_id)
            .vault_name(&self.vault)
            .job_id(job_id)
            .send()
            .await
            .map_err(|e| sdk_error("get job output", e))?;

        let checksum = output.checksum().map(str::to_string);

        Ok(JobOutput {
            body: Box::pin(output.body.into_async_read()),
            checksum,
        })
    }
}
