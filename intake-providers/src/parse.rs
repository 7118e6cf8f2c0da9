use anyhow::{Context, anyhow};
use intake_core::analysis::AnalysisResult;
use intake_core::job::StatusReport;
use intake_core::types::{CaseId, JobId};
use serde::Deserialize;
use serde_json::Value;

/// Best-effort message from an error body (`{"error": ...}` or `{"message": ...}`).
pub fn error_message(body: &[u8]) -> Option<String> {
    let v: Value = serde_json::from_slice(body).ok()?;
    ["error", "message", "detail"]
        .iter()
        .find_map(|k| v.get(k).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Describes a failed response for error messages and logs.
pub fn describe_failure(status: u16, body: &[u8]) -> String {
    match error_message(body) {
        Some(msg) => format!("HTTP {status}: {msg}"),
        None => format!("HTTP {status}"),
    }
}

fn reject_embedded_error(body: &[u8]) -> anyhow::Result<()> {
    match error_message_strict(body) {
        Some(msg) => Err(anyhow!(msg)),
        None => Ok(()),
    }
}

// Only `error` counts inside a success body; `message` is often informational.
fn error_message_strict(body: &[u8]) -> Option<String> {
    let v: Value = serde_json::from_slice(body).ok()?;
    v.get("error")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn id_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    transcript_id: Option<Value>,
    #[serde(default)]
    job_id: Option<Value>,
}

pub fn parse_upload_response(body: &[u8]) -> anyhow::Result<JobId> {
    reject_embedded_error(body)?;
    let resp: UploadResponse = serde_json::from_slice(body).context("decode upload JSON")?;
    resp.transcript_id
        .as_ref()
        .or(resp.job_id.as_ref())
        .and_then(id_text)
        .map(JobId::new)
        .ok_or_else(|| anyhow!("upload response has no transcript_id"))
}

/// A body with an `error` but no `status` is a failed lookup, not a job state.
pub fn parse_status_report(body: &[u8]) -> anyhow::Result<StatusReport> {
    let report: StatusReport = serde_json::from_slice(body).context("decode status JSON")?;
    if report.status.as_str().is_empty() {
        if let Some(err) = report.error.as_deref().filter(|e| !e.trim().is_empty()) {
            return Err(anyhow!("status lookup failed: {err}"));
        }
    }
    Ok(report)
}

pub fn parse_analysis(body: &[u8]) -> anyhow::Result<AnalysisResult> {
    reject_embedded_error(body)?;
    let v: Value = serde_json::from_slice(body).context("decode analysis JSON")?;
    if !v.is_object() {
        return Err(anyhow!("analysis response is not an object"));
    }
    serde_json::from_value(v).context("decode analysis fields")
}

#[derive(Debug, Deserialize)]
struct CaseResponse {
    #[serde(default)]
    case_id: Option<Value>,
}

pub fn parse_case_id(body: &[u8]) -> anyhow::Result<CaseId> {
    reject_embedded_error(body)?;
    let resp: CaseResponse = serde_json::from_slice(body).context("decode case JSON")?;
    let raw = resp
        .case_id
        .as_ref()
        .and_then(id_text)
        .ok_or_else(|| anyhow!("case response has no case_id"))?;
    let id: i64 = raw
        .parse()
        .with_context(|| format!("case_id is not an integer: {raw}"))?;
    Ok(CaseId(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_core::job::JobStatus;

    #[test]
    fn parses_upload_id_as_string_or_number() {
        let body = br#"{"status":"processing","transcript_id":"job-123"}"#;
        assert_eq!(parse_upload_response(body).unwrap(), JobId::new("job-123"));
        assert_eq!(
            parse_upload_response(br#"{"transcript_id":77}"#).unwrap(),
            JobId::new("77")
        );
    }

    #[test]
    fn upload_without_id_or_with_error_fails() {
        assert!(parse_upload_response(br#"{"status":"processing"}"#).is_err());
        let err = parse_upload_response(br#"{"error":"Unsupported audio type"}"#).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported audio type");
        assert!(parse_upload_response(b"<html>").is_err());
    }

    #[test]
    fn parses_status_with_extras() {
        let body = br#"{"transcript_id":"j","status":"completed","text":"hi","error":null,
            "entities":[{"entity_type":"person_name","text":"Ana"}]}"#;
        let r = parse_status_report(body).unwrap();
        assert_eq!(r.status, JobStatus::Completed);
        assert_eq!(r.text.as_deref(), Some("hi"));
        assert!(r.entities.is_some());
        assert!(r.auto_highlights.is_none());

        let r = parse_status_report(br#"{"status":"error","error":"bad audio"}"#).unwrap();
        assert_eq!(r.status, JobStatus::Error);
        assert!(parse_status_report(br#"{"error":"provider down"}"#).is_err());
    }

    #[test]
    fn parses_analysis_and_rejects_error_body() {
        let body = br#"{"category":"Personal Injury","case_type_key":"premises_liability",
            "urgency":"High","key_facts":{"location":"store"},"dates":{},"parties":[],
            "suggested_actions":["Request incident report"],"confidence":0.8}"#;
        let a = parse_analysis(body).unwrap();
        assert_eq!(a.case_type_key.as_deref(), Some("premises_liability"));
        assert_eq!(a.suggested_actions.len(), 1);

        assert!(parse_analysis(br#"{"error":"Analyzer unavailable"}"#).is_err());
        assert!(parse_analysis(b"[]").is_err());
    }

    #[test]
    fn parses_case_id() {
        assert_eq!(parse_case_id(br#"{"case_id":42}"#).unwrap(), CaseId(42));
        assert_eq!(parse_case_id(br#"{"case_id":"42"}"#).unwrap(), CaseId(42));
        assert!(parse_case_id(br#"{"case_id":"x"}"#).is_err());
        assert!(parse_case_id(br#"{"ok":true}"#).is_err());
    }

    #[test]
    fn describes_failures() {
        assert_eq!(describe_failure(413, br#"{"error":"File too large"}"#), "HTTP 413: File too large");
        assert_eq!(describe_failure(502, b"bad gateway"), "HTTP 502");
    }
}
