use std::sync::Arc;
use std::time::Duration;

use intake_audio::test::TestMicrophone;
use intake_core::config::{AppConfig, IntakeConfig};
use intake_core::error::IntakeError;
use intake_core::types::{AudioBlob, CaseId, ClientFields};
use intake_engine::session::IntakeStage;
use intake_runtime::build_orchestrator;
use serde_json::json;
use wiremock::matchers::{basic_auth, body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn app_config(server: &MockServer) -> AppConfig {
    let mut cfg = AppConfig {
        intake: Some(IntakeConfig {
            chunk_interval_ms: 50,
            ..IntakeConfig::staff_console().with_poll(20, 10)
        }),
        ..AppConfig::default()
    };
    cfg.backend.base_url = server.uri();
    cfg.backend.basic_auth_user = Some("staff".into());
    cfg
}

async fn mount_upload(server: &MockServer, job: &str) {
    Mock::given(method("POST"))
        .and(path("/api/transcribe"))
        .and(basic_auth("staff", "pw"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "processing", "transcript_id": job})),
        )
        .mount(server)
        .await;
}

async fn mount_statuses(server: &MockServer, job: &str, pending: u64, last: serde_json::Value) {
    let status_path = format!("/api/transcripts/{job}");
    Mock::given(method("GET"))
        .and(path(status_path.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "processing"})))
        .up_to_n_times(pending)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(status_path.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(last))
        .mount(server)
        .await;
}

#[tokio::test]
async fn file_intake_runs_against_http_backend() {
    let server = MockServer::start().await;
    mount_upload(&server, "job-123").await;
    mount_statuses(
        &server,
        "job-123",
        2,
        json!({"status": "completed", "text": "  I slipped on a wet floor at the store.  "}),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/api/intake/analyze"))
        .and(body_json(json!({"text": "I slipped on a wet floor at the store."})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "category": "Personal Injury",
            "case_type_key": "premises_liability",
            "urgency": "High"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/intake/auto/staff"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"case_id": 42})))
        .expect(1)
        .mount(&server)
        .await;

    let o = build_orchestrator(
        &app_config(&server),
        Arc::new(TestMicrophone::new()),
        Some("pw".into()),
    )
    .unwrap();

    let blob = AudioBlob::new("call.webm", "audio/webm", vec![5; 1024]);
    let job = o.transcribe_file(blob).await.unwrap();
    assert_eq!(job.id.as_str(), "job-123");
    assert_eq!(job.attempts, 3);
    assert_eq!(o.stage(), IntakeStage::Completed);

    let analysis = o.analyze().await.unwrap();
    assert_eq!(analysis.case_type_key.as_deref(), Some("premises_liability"));
    assert_eq!(o.stage(), IntakeStage::Analyzed);

    let client = ClientFields {
        first_name: "Ana".into(),
        ..ClientFields::default()
    };
    assert_eq!(o.create_case(client, "").await.unwrap(), CaseId(42));
    assert_eq!(o.stage(), IntakeStage::Done);
}

#[tokio::test]
async fn recorded_intake_uploads_captured_audio() {
    let server = MockServer::start().await;
    mount_upload(&server, "job-7").await;
    mount_statuses(&server, "job-7", 1, json!({"status": "completed", "text": "hello"})).await;

    let mic = TestMicrophone::new();
    let o = build_orchestrator(&app_config(&server), Arc::new(mic.clone()), Some("pw".into()))
        .unwrap();

    o.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(o.stop());

    assert_eq!(o.wait_for_transcript().await.unwrap(), "hello");
    assert_eq!(mic.open_streams(), 0);

    let requests = server.received_requests().await.unwrap();
    let upload = requests
        .iter()
        .find(|r| r.url.path() == "/api/transcribe")
        .unwrap();
    let body = String::from_utf8_lossy(&upload.body);
    assert!(body.contains("name=\"audio_file\""));
    assert!(body.contains("Content-Type: audio/webm"));
}

#[tokio::test]
async fn remote_job_error_is_reported() {
    let server = MockServer::start().await;
    mount_upload(&server, "job-err").await;
    mount_statuses(
        &server,
        "job-err",
        0,
        json!({"status": "error", "error": "Audio could not be decoded"}),
    )
    .await;

    let o = build_orchestrator(
        &app_config(&server),
        Arc::new(TestMicrophone::new()),
        Some("pw".into()),
    )
    .unwrap();

    let err = o
        .transcribe_file(AudioBlob::new("bad.wav", "audio/wav", vec![0; 16]))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        IntakeError::RemoteError("Audio could not be decoded".into())
    );
    assert_eq!(o.stage(), IntakeStage::Error);
    assert!(o.snapshot().has_audio);
}

#[tokio::test]
async fn rejected_credentials_fail_the_upload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/transcribe"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "Unauthorized"})))
        .mount(&server)
        .await;

    let o = build_orchestrator(&app_config(&server), Arc::new(TestMicrophone::new()), None)
        .unwrap();
    let err = o
        .transcribe_file(AudioBlob::new("call.webm", "audio/webm", vec![1; 32]))
        .await
        .unwrap_err();
    assert_eq!(err, IntakeError::UploadFailed("HTTP 401: Unauthorized".into()));
    assert_eq!(o.stage(), IntakeStage::Error);
}
