//! HTTP client for the exam score API.
//!
//! Every endpoint except `/health` wraps its payload in a
//! `{success, data, message}` envelope; [`ApiClient`] unwraps it and maps
//! transport and HTTP failures to [`ApiError`].

use crate::config::ApiConfig;
use crate::models::{
    BulkSearchResult, CouncilResult, Overview, ScoreRangeResult, ScoreRecord, TopScoresResult,
};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors returned by the score API client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid API base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("cannot connect to the score API at {url}. Is the server running?")]
    Connect { url: String },

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("score API error {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("score API rejected the request: {message}")]
    Rejected { message: String },

    #[error("score API response carried no data")]
    MissingData,

    #[error("failed to decode score API response: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to send request: {0}")]
    Request(#[source] reqwest::Error),
}

impl ApiError {
    /// Whether the error means the queried candidate or council does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    /// Turn a 404 status into [`ApiError::NotFound`] for `what`.
    fn or_not_found(self, what: String) -> Self {
        match self {
            ApiError::Status { status, .. } if status == StatusCode::NOT_FOUND => {
                ApiError::NotFound { what }
            }
            other => other,
        }
    }
}

/// Response envelope shared by the data endpoints.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    fn into_data(self) -> Result<T, ApiError> {
        if !self.success {
            return Err(ApiError::Rejected {
                message: self.message.unwrap_or_else(|| "request failed".to_string()),
            });
        }
        self.data.ok_or(ApiError::MissingData)
    }
}

/// Client for the exam score REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http_client: reqwest::Client,
    base_url: Url,
    timeout_seconds: u64,
}

impl ApiClient {
    /// Create a client for the API described by `config`.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| ApiError::InvalidBaseUrl {
            url: config.base_url.clone(),
            reason: e.to_string(),
        })?;

        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(ApiError::InvalidBaseUrl {
                url: config.base_url.clone(),
                reason: "expected an http:// or https:// URL".to_string(),
            });
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .user_agent(concat!("exam-lookup/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApiError::Client)?;

        info!("Using score API at {}", base_url);

        Ok(Self {
            http_client,
            base_url,
            timeout_seconds: config.timeout_seconds,
        })
    }

    /// Base URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Headline figures for the whole exam session.
    pub async fn overview(&self) -> Result<Overview, ApiError> {
        let url = self.endpoint(&["api", "metadata"]);
        self.fetch(Method::GET, url, None).await
    }

    /// Look up one candidate by registration number.
    ///
    /// A 404 means the candidate does not exist.
    pub async fn student(&self, registration_number: &str) -> Result<ScoreRecord, ApiError> {
        let url = self.endpoint(&["api", "student", registration_number]);
        self.fetch(Method::GET, url, None)
            .await
            .map_err(|e| e.or_not_found(format!("candidate {}", registration_number)))
    }

    /// Look up several candidates at once.
    pub async fn search_students(
        &self,
        registration_numbers: &[String],
    ) -> Result<BulkSearchResult, ApiError> {
        let url = self.endpoint(&["api", "students", "search"]);
        let body = json!({ "sbds": registration_numbers });
        self.fetch(Method::POST, url, Some(body)).await
    }

    /// Candidates whose total falls within `[min, max]`.
    ///
    /// Inclusivity of the bounds is decided by the server.
    pub async fn score_range(&self, min: f64, max: f64) -> Result<ScoreRangeResult, ApiError> {
        let mut url = self.endpoint(&["api", "statistics", "score-range"]);
        url.query_pairs_mut()
            .append_pair("min_score", &min.to_string())
            .append_pair("max_score", &max.to_string());
        self.fetch(Method::GET, url, None).await
    }

    /// Candidates and figures for one examination council.
    ///
    /// A 404 means the council does not exist.
    pub async fn council(&self, council_code: &str) -> Result<CouncilResult, ApiError> {
        let url = self.endpoint(&["api", "statistics", "by-council", council_code]);
        self.fetch(Method::GET, url, None)
            .await
            .map_err(|e| e.or_not_found(format!("council {}", council_code)))
    }

    /// The `limit` highest-scoring candidates.
    pub async fn top_scores(&self, limit: usize) -> Result<TopScoresResult, ApiError> {
        let mut url = self.endpoint(&["api", "top-scores"]);
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string());
        self.fetch(Method::GET, url, None).await
    }

    /// Raw health report of the API server.
    pub async fn health(&self) -> Result<Value, ApiError> {
        let url = self.endpoint(&["health"]);
        let text = self.send(Method::GET, url, None).await?;
        serde_json::from_str(&text).map_err(ApiError::Decode)
    }

    /// Resolve path segments against the base URL, percent-encoding each.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `new`: the base URL can carry a path.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<T, ApiError> {
        let text = self.send(method, url, body).await?;
        let envelope: ApiEnvelope<T> = serde_json::from_str(&text).map_err(ApiError::Decode)?;
        envelope.into_data().map_err(|e| {
            warn!("API error: {}", e);
            e
        })
    }

    /// Send a request and return the body of a successful response.
    ///
    /// Any non-2xx status, 404 included, becomes [`ApiError::Status`].
    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<String, ApiError> {
        debug!("API request: {} {}", method, url);

        let mut request = self.http_client.request(method, url);
        if let Some(ref body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !status.is_success() {
            warn!("API error {}: {}", status, text);
            return Err(ApiError::Status { status, body: text });
        }

        Ok(text)
    }

    fn map_transport_error(&self, error: reqwest::Error) -> ApiError {
        let mapped = if error.is_timeout() {
            ApiError::Timeout {
                seconds: self.timeout_seconds,
            }
        } else if error.is_connect() {
            ApiError::Connect {
                url: self.base_url.to_string(),
            }
        } else {
            ApiError::Request(error)
        };
        warn!("API error: {}", mapped);
        mapped
    }
}
