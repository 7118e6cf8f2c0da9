use crate::request::{Body, HttpRequest, Method};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub fn build_client() -> anyhow::Result<reqwest::Client> {
    // Without an explicit timeout a stalled backend would hang a poll attempt
    // (and with it the whole intake) indefinitely.
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .build()
        .context("build http client")
}

pub async fn execute(req: &HttpRequest) -> anyhow::Result<HttpResponse> {
    let client = build_client()?;
    execute_with(&client, req).await
}

pub async fn execute_with(
    client: &reqwest::Client,
    req: &HttpRequest,
) -> anyhow::Result<HttpResponse> {
    log::trace!("headers: {:?}", req.redacted_headers());

    let mut headers = HeaderMap::new();
    for (k, v) in &req.headers {
        let name = HeaderName::from_bytes(k.as_bytes())
            .with_context(|| format!("invalid header name: {k}"))?;
        let value =
            HeaderValue::from_str(v).with_context(|| format!("invalid header value for {k}"))?;
        headers.insert(name, value);
    }

    let builder = match req.method {
        Method::Get => client.get(&req.url),
        Method::Post => client.post(&req.url),
    }
    .headers(headers);

    let builder = match &req.body {
        Body::Empty => builder,
        Body::Json(s) => builder.body(s.clone()),
        Body::MultipartFormData { bytes, .. } => builder.body(bytes.clone()),
    };

    let resp = builder
        .send()
        .await
        .with_context(|| format!("{} {} failed", req.method, req.url))?;
    let status = resp.status().as_u16();
    log::debug!("{} {} -> {status}", req.method, req.url);
    let body = resp
        .bytes()
        .await
        .context("failed reading response body")?
        .to_vec();

    Ok(HttpResponse { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_range_is_2xx() {
        let ok = HttpResponse { status: 204, body: vec![] };
        let redirect = HttpResponse { status: 302, body: vec![] };
        assert!(ok.is_success());
        assert!(!redirect.is_success());
    }

    #[tokio::test]
    async fn unreachable_backend_names_the_call() {
        // Nothing listens on the discard port.
        let req = HttpRequest::get("http://127.0.0.1:9/api/transcripts/job-1");
        let err = execute(&req).await.unwrap_err();
        assert!(err.to_string().contains("GET http://127.0.0.1:9/api/transcripts/job-1"));
    }

    #[test]
    fn invalid_header_value_is_rejected_before_sending() {
        let req = HttpRequest::get("http://127.0.0.1:9/").with_header("X-Bad", "line\nbreak");
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let err = rt.block_on(execute(&req)).unwrap_err();
        assert!(err.to_string().contains("invalid header value for X-Bad"));
    }
}
