use std::time::Duration;

use evidence_core::{JobId, JobRecord, JobRequest, ProgressSnapshot};
use evidence_logging::evidence_debug;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{ApiError, FailureKind};

#[derive(Debug, Clone)]
pub struct BackendSettings {
    /// Root of the backend API, e.g. `http://localhost:8000/api`.
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Backend operations used by the engine, scoped to one project.
#[async_trait::async_trait]
pub trait JobsApi: Send + Sync {
    /// Issues a trigger or control request. `Ok` carries the backend's message, if any.
    async fn send(&self, request: &JobRequest) -> Result<Option<String>, ApiError>;

    async fn list_jobs(&self) -> Result<Vec<JobRecord>, ApiError>;
}

/// One-shot snapshot fetch used by the poller.
#[async_trait::async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_snapshot(&self) -> Result<ProgressSnapshot, ApiError>;
}

#[derive(Debug, Default, Deserialize)]
struct ControlResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default, alias = "detail", alias = "error")]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct BatchBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    document_ids: Option<&'a [JobId]>,
}

#[derive(Debug, Clone)]
pub struct ReqwestJobsApi {
    client: reqwest::Client,
    base: Url,
    project_id: String,
}

impl ReqwestJobsApi {
    pub fn new(settings: &BackendSettings, project_id: impl Into<String>) -> Result<Self, ApiError> {
        let base = parse_base_url(&settings.base_url)?;
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            client,
            base,
            project_id: project_id.into(),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Endpoint of the project's server-sent progress events.
    pub fn stream_url(&self) -> Result<Url, ApiError> {
        endpoint(&self.base, &["jobs", "stream", &self.project_id])
    }

    fn request_url(&self, request: &JobRequest) -> Result<Url, ApiError> {
        match request {
            JobRequest::Start(job_id) => endpoint(&self.base, &["jobs", job_id.as_str()]),
            JobRequest::StartBatch { .. } => {
                endpoint(&self.base, &["jobs", "batch", &self.project_id])
            }
            JobRequest::Pause(job_id) => endpoint(&self.base, &["jobs", "pause", job_id.as_str()]),
            JobRequest::Cancel(job_id) => {
                endpoint(&self.base, &["jobs", "cancel", job_id.as_str()])
            }
            JobRequest::Resume(job_id) => {
                endpoint(&self.base, &["jobs", "resume", job_id.as_str()])
            }
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let response = ensure_success(response).await?;
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        serde_json::from_slice(&body).map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))
    }
}

#[async_trait::async_trait]
impl JobsApi for ReqwestJobsApi {
    async fn send(&self, request: &JobRequest) -> Result<Option<String>, ApiError> {
        let url = self.request_url(request)?;
        let mut builder = self.client.post(url.clone()).header(ACCEPT, "application/json");
        if let JobRequest::StartBatch { selected } = request {
            let body = serde_json::to_vec(&BatchBody {
                document_ids: selected.as_deref(),
            })
            .map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))?;
            builder = builder.header(CONTENT_TYPE, "application/json").body(body);
        }

        evidence_debug!("POST {}", url);
        let response = builder.send().await.map_err(map_reqwest_error)?;
        let response = ensure_success(response).await?;
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        // Some endpoints answer 2xx with an empty or non-JSON body.
        let parsed: ControlResponse = serde_json::from_slice(&body).unwrap_or_default();
        if parsed.success == Some(false) {
            return Err(ApiError::new(
                FailureKind::Rejected,
                parsed
                    .message
                    .unwrap_or_else(|| "request rejected by backend".to_string()),
            ));
        }
        Ok(parsed.message)
    }

    async fn list_jobs(&self) -> Result<Vec<JobRecord>, ApiError> {
        let url = endpoint(&self.base, &["jobs", "list", &self.project_id])?;
        self.get_json(url).await
    }
}

#[async_trait::async_trait]
impl SnapshotSource for ReqwestJobsApi {
    async fn fetch_snapshot(&self) -> Result<ProgressSnapshot, ApiError> {
        let url = endpoint(&self.base, &["jobs", "progress", &self.project_id])?;
        self.get_json(url).await
    }
}

pub(crate) fn parse_base_url(raw: &str) -> Result<Url, ApiError> {
    let url = Url::parse(raw).map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ApiError::new(
            FailureKind::InvalidUrl,
            format!("{raw} cannot be used as an API base"),
        ));
    }
    Ok(url)
}

/// Appends percent-encoded path segments to the API base.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, ApiError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ApiError::new(FailureKind::InvalidUrl, "base url cannot have a path"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.bytes().await.unwrap_or_default();
    Err(status_error(status, &body))
}

fn status_error(status: StatusCode, body: &[u8]) -> ApiError {
    let detail = serde_json::from_slice::<ControlResponse>(body)
        .ok()
        .and_then(|parsed| parsed.message)
        .filter(|message| !message.trim().is_empty());
    let message = match detail {
        Some(detail) => detail,
        None => format!("http status {status}"),
    };
    ApiError::new(FailureKind::HttpStatus(status.as_u16()), message)
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(FailureKind::Timeout, err.to_string());
    }
    ApiError::new(FailureKind::Network, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_and_escapes_segments() {
        let base = parse_base_url("http://localhost:8000/api/").unwrap();
        let url = endpoint(&base, &["jobs", "pause", "doc 1/2"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/jobs/pause/doc%201%2F2");
    }

    #[test]
    fn rejects_non_base_urls() {
        let err = parse_base_url("mailto:ops@example.com").unwrap_err();
        assert_eq!(err.kind, FailureKind::InvalidUrl);
    }

    #[test]
    fn status_error_prefers_backend_detail() {
        let err = status_error(StatusCode::NOT_FOUND, br#"{"detail": "Document not found"}"#);
        assert_eq!(err.kind, FailureKind::HttpStatus(404));
        assert_eq!(err.message, "Document not found");

        let err = status_error(StatusCode::BAD_GATEWAY, b"<html>oops</html>");
        assert_eq!(err.message, "http status 502 Bad Gateway");
    }
}
