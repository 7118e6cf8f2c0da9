use anyhow::Context;
use intake_core::analysis::AnalysisResult;
use intake_core::config::BackendConfig;
use intake_core::job::StatusReport;
use intake_core::types::{AudioBlob, CaseId, CaseRequest, JobId};
use intake_engine::traits::{IntakeService, TranscriptionService};
use intake_providers::backend::BackendEndpoint;
use intake_providers::parse;
use intake_providers::request::HttpRequest;
use intake_providers::runtime::{self, HttpResponse};

/// The firm's intake backend over HTTP: upload, status, analysis, case creation.
#[derive(Debug, Clone)]
pub struct HttpIntakeBackend {
    endpoint: BackendEndpoint,
    client: reqwest::Client,
}

impl HttpIntakeBackend {
    pub fn new(endpoint: BackendEndpoint) -> anyhow::Result<Self> {
        Ok(Self {
            endpoint,
            client: runtime::build_client()?,
        })
    }

    pub fn from_config(cfg: &BackendConfig, password: Option<String>) -> anyhow::Result<Self> {
        Self::new(BackendEndpoint::from_config(cfg, password))
    }

    pub fn endpoint(&self) -> &BackendEndpoint {
        &self.endpoint
    }

    async fn send(&self, what: &str, req: HttpRequest) -> anyhow::Result<HttpResponse> {
        let resp = runtime::execute_with(&self.client, &req)
            .await
            .with_context(|| format!("{what} request"))?;
        if !resp.is_success() {
            log::warn!("{what} failed: status={}", resp.status);
            return Err(anyhow::anyhow!(parse::describe_failure(
                resp.status,
                &resp.body
            )));
        }
        Ok(resp)
    }
}

#[async_trait::async_trait]
impl TranscriptionService for HttpIntakeBackend {
    async fn upload(&self, blob: &AudioBlob) -> anyhow::Result<JobId> {
        let req = self.endpoint.upload_request(blob)?;
        let resp = self.send("upload", req).await?;
        let id = parse::parse_upload_response(&resp.body)?;
        log::info!("uploaded {} ({} bytes) as job {id}", blob.filename, blob.len());
        Ok(id)
    }

    async fn status(&self, id: &JobId) -> anyhow::Result<StatusReport> {
        let req = self.endpoint.status_request(id)?;
        let resp = self.send("status", req).await?;
        parse::parse_status_report(&resp.body)
    }
}

#[async_trait::async_trait]
impl IntakeService for HttpIntakeBackend {
    async fn analyze(&self, text: &str) -> anyhow::Result<AnalysisResult> {
        let req = self.endpoint.analyze_request(text)?;
        let resp = self.send("analyze", req).await?;
        parse::parse_analysis(&resp.body)
    }

    async fn create_case(&self, req: &CaseRequest) -> anyhow::Result<CaseId> {
        let http = self.endpoint.create_case_request(req)?;
        let resp = self.send("create case", http).await?;
        parse::parse_case_id(&resp.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_core::job::JobStatus;
    use intake_core::types::ClientFields;
    use serde_json::json;
    use wiremock::matchers::{
        basic_auth, body_json, body_string_contains, header, header_exists, method, path,
    };
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer, user: Option<&str>) -> HttpIntakeBackend {
        let cfg = BackendConfig {
            base_url: server.uri(),
            basic_auth_user: user.map(str::to_string),
            ..BackendConfig::default()
        };
        HttpIntakeBackend::from_config(&cfg, Some("secret".into())).unwrap()
    }

    #[tokio::test]
    async fn upload_posts_multipart_audio_with_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/transcribe"))
            .and(basic_auth("staff", "secret"))
            .and(header_exists("content-type"))
            .and(body_string_contains("name=\"audio_file\""))
            .and(body_string_contains("filename=\"rec.webm\""))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "processing", "transcript_id": "job-123"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let blob = AudioBlob::new("rec.webm", "audio/webm", vec![1, 2, 3]);
        let id = backend(&server, Some("staff")).upload(&blob).await.unwrap();
        assert_eq!(id, JobId::new("job-123"));
    }

    #[tokio::test]
    async fn upload_rejection_surfaces_backend_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/transcribe"))
            .respond_with(
                ResponseTemplate::new(413).set_body_json(json!({"error": "File too large"})),
            )
            .mount(&server)
            .await;

        let blob = AudioBlob::new("rec.webm", "audio/webm", vec![0; 8]);
        let err = backend(&server, None).upload(&blob).await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 413: File too large");
    }

    #[tokio::test]
    async fn status_reads_job_state() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/transcripts/job-9"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "transcript_id": "job-9",
                "status": "completed",
                "text": "I slipped on a wet floor.",
                "error": null
            })))
            .mount(&server)
            .await;

        let report = backend(&server, None)
            .status(&JobId::new("job-9"))
            .await
            .unwrap();
        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.text.as_deref(), Some("I slipped on a wet floor."));
    }

    #[tokio::test]
    async fn status_server_error_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/transcripts/job-9"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = backend(&server, None)
            .status(&JobId::new("job-9"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "HTTP 503");
    }

    #[tokio::test]
    async fn analyze_sends_text_and_decodes_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/intake/analyze"))
            .and(body_json(json!({"text": "slipped at the store"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "category": "Personal Injury",
                "case_type_key": "premises_liability",
                "urgency": "High",
                "key_facts": {"location": "store"},
                "suggested_actions": ["Request incident report"]
            })))
            .mount(&server)
            .await;

        let analysis = backend(&server, None)
            .analyze("slipped at the store")
            .await
            .unwrap();
        assert_eq!(analysis.case_type_key.as_deref(), Some("premises_liability"));
        assert_eq!(analysis.key_facts.get("location").map(String::as_str), Some("store"));
    }

    #[tokio::test]
    async fn create_case_posts_client_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/intake/auto/staff"))
            .and(body_json(json!({
                "text": "slipped",
                "title": "Client Intake",
                "client": {
                    "first_name": "Ana",
                    "last_name": "Diaz",
                    "email": "",
                    "phone": "555-0100",
                    "address": ""
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"case_id": 42})))
            .mount(&server)
            .await;

        let client = ClientFields {
            first_name: "Ana".into(),
            last_name: "Diaz".into(),
            phone: "555-0100".into(),
            ..ClientFields::default()
        };
        let id = backend(&server, None)
            .create_case(&CaseRequest::new("slipped", "", client))
            .await
            .unwrap();
        assert_eq!(id, CaseId(42));
    }

    #[tokio::test]
    async fn create_case_error_body_fails_even_on_200() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/intake/auto/staff"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"error": "Database locked"})),
            )
            .mount(&server)
            .await;

        let err = backend(&server, None)
            .create_case(&CaseRequest::new("slipped", "", ClientFields::default()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Database locked"));
    }
}
