use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_CASE_TITLE: &str = "Client Intake";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Opaque transcription handle assigned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(pub i64);

impl std::fmt::Display for CaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A finished recording or a user-picked file, ready for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct AudioBlob {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for AudioBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioBlob")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("bytes_len", &self.bytes.len())
            .finish()
    }
}

impl AudioBlob {
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClientFields {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
}

/// Body of the case-creation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRequest {
    pub text: String,
    pub title: String,
    pub client: ClientFields,
}

impl CaseRequest {
    pub fn new(text: impl Into<String>, title: &str, client: ClientFields) -> Self {
        let title = title.trim();
        Self {
            text: text.into(),
            title: if title.is_empty() {
                DEFAULT_CASE_TITLE.to_string()
            } else {
                title.to_string()
            },
            client,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_request_defaults_blank_title() {
        let req = CaseRequest::new("slipped", "   ", ClientFields::default());
        assert_eq!(req.title, DEFAULT_CASE_TITLE);

        let req = CaseRequest::new("slipped", " Store fall ", ClientFields::default());
        assert_eq!(req.title, "Store fall");
    }

    #[test]
    fn blob_debug_hides_bytes() {
        let blob = AudioBlob::new("a.webm", "audio/webm", vec![7; 32]);
        let s = format!("{blob:?}");
        assert!(s.contains("bytes_len: 32"));
        assert!(!s.contains("7, 7"));
    }

    #[test]
    fn job_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&JobId::new("job-123")).unwrap();
        assert_eq!(json, "\"job-123\"");
    }
}
