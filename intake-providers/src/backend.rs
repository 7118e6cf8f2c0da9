use anyhow::{Context, anyhow};
use base64::Engine;
use intake_core::config::BackendConfig;
use intake_core::types::{AudioBlob, CaseRequest, JobId};
use serde_json::json;
use url::Url;

use crate::multipart::{AUDIO_FIELD, MultipartForm};
use crate::request::HttpRequest;

/// Where and how to reach the intake backend.
#[derive(Clone, PartialEq, Eq)]
pub struct BackendEndpoint {
    pub base_url: String,
    pub upload_path: String,
    pub status_path: String,
    pub analyze_path: String,
    pub create_case_path: String,
    pub basic_auth: Option<(String, String)>,
    pub extra_headers: Vec<(String, String)>,
}

impl std::fmt::Debug for BackendEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendEndpoint")
            .field("base_url", &self.base_url)
            .field("upload_path", &self.upload_path)
            .field("status_path", &self.status_path)
            .field("analyze_path", &self.analyze_path)
            .field("create_case_path", &self.create_case_path)
            .field(
                "basic_auth_user",
                &self.basic_auth.as_ref().map(|(user, _)| user),
            )
            .field("extra_headers", &self.extra_headers.len())
            .finish()
    }
}

impl BackendEndpoint {
    /// `password` pairs with `cfg.basic_auth_user`; without a user no
    /// credentials are sent.
    pub fn from_config(cfg: &BackendConfig, password: Option<String>) -> Self {
        let basic_auth = cfg
            .basic_auth_user
            .as_ref()
            .filter(|u| !u.trim().is_empty())
            .map(|u| (u.clone(), password.unwrap_or_default()));

        Self {
            base_url: cfg.base_url.clone(),
            upload_path: cfg.upload_path.clone(),
            status_path: cfg.status_path.clone(),
            analyze_path: cfg.analyze_path.clone(),
            create_case_path: cfg.create_case_path.clone(),
            basic_auth,
            extra_headers: cfg.extra_headers.clone(),
        }
    }

    fn url(&self, path: &str) -> anyhow::Result<Url> {
        let raw = join_url(&self.base_url, path);
        Url::parse(&raw).with_context(|| format!("invalid backend url: {raw}"))
    }

    fn decorate(&self, mut req: HttpRequest) -> HttpRequest {
        if let Some((user, pass)) = &self.basic_auth {
            let token = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{pass}"));
            req.set_header("Authorization", format!("Basic {token}"));
        }
        for (name, value) in &self.extra_headers {
            req.set_header(name.as_str(), value.as_str());
        }
        req
    }

    pub fn upload_request(&self, blob: &AudioBlob) -> anyhow::Result<HttpRequest> {
        let url = self.url(&self.upload_path)?;
        let (boundary, bytes) = MultipartForm::new().file(AUDIO_FIELD, blob).finish();
        Ok(self.decorate(HttpRequest::post_multipart(url, boundary, bytes)))
    }

    /// The job id is appended as one percent-encoded path segment.
    pub fn status_request(&self, job: &JobId) -> anyhow::Result<HttpRequest> {
        let mut url = self.url(&self.status_path)?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("backend url cannot take a path: {}", self.base_url))?
            .pop_if_empty()
            .push(job.as_str());
        Ok(self.decorate(HttpRequest::get(url)))
    }

    pub fn analyze_request(&self, text: &str) -> anyhow::Result<HttpRequest> {
        let url = self.url(&self.analyze_path)?;
        Ok(self.decorate(HttpRequest::post_json(url, &json!({ "text": text }))))
    }

    pub fn create_case_request(&self, req: &CaseRequest) -> anyhow::Result<HttpRequest> {
        let url = self.url(&self.create_case_path)?;
        let payload = serde_json::to_value(req).context("encode case request")?;
        Ok(self.decorate(HttpRequest::post_json(url, &payload)))
    }
}

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{}/{}", base, path)
}
