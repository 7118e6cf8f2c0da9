use crate::types::JobId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Status values as emitted by the transcription backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Error,
    Other(String),
}

impl JobStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "queued" => JobStatus::Queued,
            "processing" => JobStatus::Processing,
            "completed" => JobStatus::Completed,
            "error" => JobStatus::Error,
            _ => JobStatus::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
            JobStatus::Other(s) => s,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

impl Serialize for JobStatus {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        Ok(raw.map(|s| JobStatus::parse(&s)).unwrap_or(JobStatus::Other(String::new())))
    }
}

/// One status response from the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: JobStatus,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub error: Option<String>,

    // Enrichment some backends attach to completed transcripts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_highlights: Option<serde_json::Value>,
}

impl StatusReport {
    pub fn new(status: JobStatus) -> Self {
        Self {
            status,
            text: None,
            error: None,
            entities: None,
            auto_highlights: None,
        }
    }

    pub fn completed(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::new(JobStatus::Completed)
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(JobStatus::Error)
        }
    }
}

/// Job lifecycle as tracked on this side, including client-synthesized states.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Processing,
    Completed,
    Error,
    Timeout,
    UploadFailed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Error | JobState::Timeout | JobState::UploadFailed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionJob {
    pub id: JobId,
    pub state: JobState,
    pub text: Option<String>,
    pub error_message: Option<String>,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_highlights: Option<serde_json::Value>,
}

impl TranscriptionJob {
    pub fn submitted(id: JobId) -> Self {
        Self {
            id,
            state: JobState::Queued,
            text: None,
            error_message: None,
            attempts: 0,
            entities: None,
            auto_highlights: None,
        }
    }

    /// Records one poll response. Returns `false` once the job is terminal,
    /// in which case nothing changes.
    pub fn apply(&mut self, report: &StatusReport) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.attempts += 1;
        match &report.status {
            JobStatus::Completed => {
                self.state = JobState::Completed;
                self.text = Some(report.text.clone().unwrap_or_default());
                self.entities = report.entities.clone();
                self.auto_highlights = report.auto_highlights.clone();
            }
            JobStatus::Error => {
                self.state = JobState::Error;
                self.error_message = Some(
                    report
                        .error
                        .clone()
                        .filter(|e| !e.trim().is_empty())
                        .unwrap_or_else(|| "Transcription failed".into()),
                );
            }
            JobStatus::Processing => self.state = JobState::Processing,
            JobStatus::Queued | JobStatus::Other(_) => {}
        }
        true
    }

    /// Counts an attempt whose status could not be read.
    pub fn record_missed_attempt(&mut self) {
        if !self.state.is_terminal() {
            self.attempts += 1;
        }
    }

    pub fn time_out(&mut self, message: impl Into<String>) {
        if !self.state.is_terminal() {
            self.state = JobState::Timeout;
            self.error_message = Some(message.into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_and_unknown_statuses() {
        assert_eq!(JobStatus::parse("queued"), JobStatus::Queued);
        assert_eq!(JobStatus::parse("Processing"), JobStatus::Processing);
        assert_eq!(
            JobStatus::parse("transcoding"),
            JobStatus::Other("transcoding".into())
        );
        assert!(!JobStatus::parse("transcoding").is_terminal());
    }

    #[test]
    fn decodes_status_report_with_missing_status() {
        let r: StatusReport = serde_json::from_str(r#"{"status":null}"#).unwrap();
        assert_eq!(r.status, JobStatus::Other(String::new()));

        let r: StatusReport =
            serde_json::from_str(r#"{"status":"completed","text":"hi","id":"x"}"#).unwrap();
        assert_eq!(r.status, JobStatus::Completed);
        assert_eq!(r.text.as_deref(), Some("hi"));
    }

    #[test]
    fn job_is_immutable_once_terminal() {
        let mut job = TranscriptionJob::submitted(JobId::new("j"));
        assert!(job.apply(&StatusReport::new(JobStatus::Processing)));
        assert!(job.apply(&StatusReport::completed("done")));
        assert_eq!(job.state, JobState::Completed);

        assert!(!job.apply(&StatusReport::failed("late")));
        job.time_out("late");
        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.error_message, None);
        assert_eq!(job.attempts, 2);
    }

    #[test]
    fn error_without_message_gets_fallback() {
        let mut job = TranscriptionJob::submitted(JobId::new("j"));
        job.apply(&StatusReport::new(JobStatus::Error));
        assert_eq!(job.error_message.as_deref(), Some("Transcription failed"));
    }
}
