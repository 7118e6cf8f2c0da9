use intake_core::analysis::AnalysisResult;
use intake_core::error::Failure;
use intake_core::job::TranscriptionJob;
use intake_core::types::{CaseId, JobId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeStage {
    #[default]
    Idle,
    Recording,
    Uploading,
    Processing,
    Completed,
    Analyzed,
    Done,
    Error,
}

impl IntakeStage {
    /// A long-running step is in flight; a page should show a pending indicator.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            IntakeStage::Recording | IntakeStage::Uploading | IntakeStage::Processing
        )
    }

    /// A transcript exists and downstream steps may run.
    pub fn has_transcript(self) -> bool {
        matches!(
            self,
            IntakeStage::Completed | IntakeStage::Analyzed | IntakeStage::Done
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            IntakeStage::Idle => "idle",
            IntakeStage::Recording => "recording",
            IntakeStage::Uploading => "uploading",
            IntakeStage::Processing => "processing",
            IntakeStage::Completed => "completed",
            IntakeStage::Analyzed => "analyzed",
            IntakeStage::Done => "done",
            IntakeStage::Error => "error",
        }
    }
}

/// Everything an embedding page renders, published after every transition.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IntakeSnapshot {
    pub stage: IntakeStage,
    pub job_id: Option<JobId>,
    pub poll_attempts: u32,

    // Raw text as returned by the backend; `transcript` is what analysis sees.
    pub raw_transcript: Option<String>,
    pub transcript: Option<String>,
    pub job: Option<TranscriptionJob>,

    pub analysis: Option<AnalysisResult>,
    pub case_id: Option<CaseId>,

    // Set in `Error`, and after a failed analysis or case creation (which do
    // not change the stage).
    pub error: Option<Failure>,

    pub has_audio: bool,
    pub step_in_flight: bool,
}
