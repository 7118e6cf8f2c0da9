use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    PermissionDenied,
    DeviceUnavailable,
    AlreadyRecording,
    PayloadTooLarge,
    UnsupportedType,
    UploadFailed,
    RemoteError,
    Timeout,
    AnalysisFailed,
    CaseCreationFailed,
    Cancelled,
    InvalidTransition,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntakeError {
    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("no audio input device available: {0}")]
    DeviceUnavailable(String),

    #[error("a recording is already in progress")]
    AlreadyRecording,

    #[error("payload is {size} bytes, limit is {limit}")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error("unsupported content type: {0:?}")]
    UnsupportedType(String),

    #[error("upload failed: {0}")]
    UploadFailed(String),

    #[error("transcription failed: {0}")]
    RemoteError(String),

    #[error("transcription timed out after {attempts} attempts")]
    Timeout {
        attempts: u32,
        last_error: Option<String>,
    },

    #[error("analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("case creation failed: {0}")]
    CaseCreationFailed(String),

    #[error("cancelled")]
    Cancelled,

    #[error("cannot {action} while {stage}")]
    InvalidTransition { stage: String, action: String },
}

impl IntakeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IntakeError::PermissionDenied => ErrorKind::PermissionDenied,
            IntakeError::DeviceUnavailable(_) => ErrorKind::DeviceUnavailable,
            IntakeError::AlreadyRecording => ErrorKind::AlreadyRecording,
            IntakeError::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            IntakeError::UnsupportedType(_) => ErrorKind::UnsupportedType,
            IntakeError::UploadFailed(_) => ErrorKind::UploadFailed,
            IntakeError::RemoteError(_) => ErrorKind::RemoteError,
            IntakeError::Timeout { .. } => ErrorKind::Timeout,
            IntakeError::AnalysisFailed(_) => ErrorKind::AnalysisFailed,
            IntakeError::CaseCreationFailed(_) => ErrorKind::CaseCreationFailed,
            IntakeError::Cancelled => ErrorKind::Cancelled,
            IntakeError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
        }
    }

    /// Short message for display. Details stay in logs.
    pub fn user_message(&self) -> String {
        match self {
            IntakeError::PermissionDenied => {
                "Could not access microphone. Please allow microphone access in your browser or system settings.".into()
            }
            IntakeError::DeviceUnavailable(_) => {
                "No microphone found. Please connect a microphone.".into()
            }
            IntakeError::AlreadyRecording => "A recording is already in progress.".into(),
            IntakeError::PayloadTooLarge { limit, .. } => format!(
                "File is too large. Maximum size is {}MB.",
                limit / crate::config::MIB
            ),
            IntakeError::UnsupportedType(_) => {
                "Please upload a valid audio or video file.".into()
            }
            IntakeError::UploadFailed(_) => "Upload failed. Please try again.".into(),
            IntakeError::RemoteError(msg) => {
                if msg.trim().is_empty() {
                    "Transcription failed.".into()
                } else {
                    format!("Transcription failed: {msg}")
                }
            }
            IntakeError::Timeout { .. } => "Transcription timeout - please try again.".into(),
            IntakeError::AnalysisFailed(_) => {
                "Analysis is unavailable right now; the transcript is still available.".into()
            }
            IntakeError::CaseCreationFailed(_) => "Could not create the case. Please retry.".into(),
            IntakeError::Cancelled => "Cancelled.".into(),
            IntakeError::InvalidTransition { action, .. } => {
                format!("Cannot {action} right now.")
            }
        }
    }

    pub fn invalid_transition(stage: impl std::fmt::Debug, action: &str) -> Self {
        IntakeError::InvalidTransition {
            stage: format!("{stage:?}").to_lowercase(),
            action: action.to_string(),
        }
    }
}

/// Serializable error record for UI state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
    pub detail: String,
}

impl From<&IntakeError> for Failure {
    fn from(e: &IntakeError) -> Self {
        Self {
            kind: e.kind(),
            message: e.user_message(),
            detail: e.to_string(),
        }
    }
}
