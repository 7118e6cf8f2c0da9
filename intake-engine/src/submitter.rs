use std::sync::Arc;

use intake_core::config::IntakeConfig;
use intake_core::error::IntakeError;
use intake_core::payload::validate_payload;
use intake_core::types::{AudioBlob, JobId};

use crate::traits::TranscriptionService;

/// Validates a payload and performs exactly one upload.
///
/// There is no retry here; resubmission is the caller's decision.
#[derive(Clone)]
pub struct JobSubmitter {
    service: Arc<dyn TranscriptionService>,
}

impl JobSubmitter {
    pub fn new(service: Arc<dyn TranscriptionService>) -> Self {
        Self { service }
    }

    pub async fn submit(
        &self,
        blob: &AudioBlob,
        size_limit_bytes: u64,
        allowed_type_prefixes: &[String],
    ) -> Result<JobId, IntakeError> {
        // Checked before any network call.
        validate_payload(blob, size_limit_bytes, allowed_type_prefixes)?;

        log::info!(
            "Uploading {} ({}, {} bytes)",
            blob.filename,
            blob.content_type,
            blob.len()
        );
        match self.service.upload(blob).await {
            Ok(id) => {
                log::info!("Upload accepted: job={id}");
                Ok(id)
            }
            Err(e) => {
                log::warn!("Upload failed: {e:#}");
                Err(IntakeError::UploadFailed(format!("{e:#}")))
            }
        }
    }

    pub async fn submit_with(
        &self,
        blob: &AudioBlob,
        cfg: &IntakeConfig,
    ) -> Result<JobId, IntakeError> {
        self.submit(blob, cfg.size_limit_bytes, &cfg.allowed_type_prefixes)
            .await
    }
}
