use async_trait::async_trait;
use intake_core::analysis::AnalysisResult;
use intake_core::job::StatusReport;
use intake_core::types::{AudioBlob, CaseId, CaseRequest, JobId};

/// The job-creating transcription backend.
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    /// Uploads one payload and returns the handle the backend assigned.
    async fn upload(&self, blob: &AudioBlob) -> anyhow::Result<JobId>;

    /// One status lookup. Transport errors and non-2xx responses are `Err`.
    async fn status(&self, job: &JobId) -> anyhow::Result<StatusReport>;
}

/// Downstream steps that consume a finished transcript.
#[async_trait]
pub trait IntakeService: Send + Sync {
    async fn analyze(&self, text: &str) -> anyhow::Result<AnalysisResult>;
    async fn create_case(&self, req: &CaseRequest) -> anyhow::Result<CaseId>;
}
