//! Pre-call configuration validation
//!
//! Before any media work, the lifecycle controller checks two things with
//! the backend: that the account's upstream provider keys are usable
//! (`GET /api/v1/providers/validate`) and that the target workflow's
//! configuration is runnable (`POST /api/v1/workflows/{id}/validate`).
//! Rejections come back as a structured body
//! `{"detail": {"errors": [{"model"|"kind", "message"}]}}` and surface to
//! the user as one line per item, `"{source}: {message}"`.

use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use tracing::debug;
use url::Url;

/// One validation problem reported by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// What the problem is about (model name or config kind)
    pub source: String,
    /// Human-readable description
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.message)
    }
}

/// The full set of problems from one validation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationIssue>);

impl ValidationErrors {
    /// Wrap a list of issues
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self(issues)
    }

    /// The individual issues
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.0.iter().map(ValidationIssue::to_string).collect();
        write!(f, "{}", rendered.join("; "))
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    errors: Vec<RawIssue>,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    model: Option<String>,
    kind: Option<String>,
    message: String,
}

/// Parse a structured validation error body, if the payload has that shape
pub fn parse_validation_errors(body: &str) -> Option<ValidationErrors> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let issues = parsed
        .detail
        .errors
        .into_iter()
        .map(|raw| ValidationIssue {
            source: raw
                .model
                .or(raw.kind)
                .unwrap_or_else(|| "config".to_string()),
            message: raw.message,
        })
        .collect();
    Some(ValidationErrors::new(issues))
}

/// Backend control-plane operations needed before starting a call
///
/// The access token is passed per request; the session may refresh it
/// between calls.
#[async_trait]
pub trait ControlApi: Send + Sync {
    /// Check the account's upstream provider/API-key configuration
    async fn validate_providers(&self, access_token: &str) -> Result<()>;

    /// Check that a workflow's configuration is runnable
    async fn validate_workflow(&self, workflow_id: &str, access_token: &str) -> Result<()>;
}

/// HTTP implementation of [`ControlApi`]
pub struct HttpControlApi {
    http: reqwest::Client,
    base: Url,
}

impl HttpControlApi {
    /// Create a client for the given backend
    pub fn new(api_base_url: &str) -> Result<Self> {
        let base = Url::parse(api_base_url)
            .map_err(|e| Error::InvalidConfig(format!("Invalid API base URL: {}", e)))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| Error::InvalidConfig(format!("Invalid endpoint {}: {}", path, e)))
    }

    async fn check(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if let Some(errors) = parse_validation_errors(&body) {
            debug!(%status, "Validation rejected: {}", errors);
            return Err(Error::Validation(errors));
        }
        Err(Error::ApiError(format!(
            "Validation request failed ({}): {}",
            status, body
        )))
    }
}

#[async_trait]
impl ControlApi for HttpControlApi {
    async fn validate_providers(&self, access_token: &str) -> Result<()> {
        let url = self.endpoint("/api/v1/providers/validate")?;
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| Error::ApiError(format!("Provider validation failed: {}", e)))?;
        self.check(response).await
    }

    async fn validate_workflow(&self, workflow_id: &str, access_token: &str) -> Result<()> {
        let url = self.endpoint(&format!("/api/v1/workflows/{}/validate", workflow_id))?;
        let response = self
            .http
            .post(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| Error::ApiError(format!("Workflow validation failed: {}", e)))?;
        self.check(response).await
    }
}
