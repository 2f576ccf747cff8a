//! Fetch-and-parse: a generic fetch collaborator composed with the parser.
//!
//! ```text
//! ┌────────────┐  FetchRequest  ┌─────────────┐
//! │ CsvFetcher │───────────────▶│ impl Fetch  │
//! │ (adapter)  │◀───────────────│ HttpFetcher │
//! └─────┬──────┘  body / error  └─────────────┘
//!       │ text
//!       ▼
//! ┌────────────┐
//! │   parser   │
//! └────────────┘
//! ```
//!
//! The collaborator knows nothing about CSV; the adapter knows nothing about
//! HTTP beyond the metadata it relays.

pub mod adapter;
pub mod http;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::TransportError;

pub use adapter::{CsvFetcher, CsvResponse, FetchFailure};
pub use http::HttpFetcher;

/// Content types accepted by [`FetchRequest::csv`].
pub const CSV_CONTENT_TYPES: &[&str] = &[
    "text/csv",
    "text/comma-separated-values",
    "text/plain",
    "application/csv",
    "application/vnd.ms-excel",
];

/// Outbound request description handed to a [`Fetch`] implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    /// Overrides the collaborator's default timeout.
    pub timeout: Option<Duration>,
    /// `None` accepts any content type.
    pub acceptable_content_types: Option<Vec<String>>,
}

impl FetchRequest {
    /// A plain GET accepting any content type.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            headers: Vec::new(),
            timeout: None,
            acceptable_content_types: None,
        }
    }

    /// A GET that only accepts CSV-ish content types.
    pub fn csv(url: impl Into<String>) -> Self {
        Self::get(url).with_acceptable_content_types(CSV_CONTENT_TYPES.iter().copied())
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_acceptable_content_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.acceptable_content_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    pub fn accept_any_content_type(mut self) -> Self {
        self.acceptable_content_types = None;
        self
    }

    /// Whether `content_type` (a full header value, parameters allowed) is
    /// acceptable. A missing content type is accepted.
    pub fn accepts(&self, content_type: Option<&str>) -> bool {
        let (Some(types), Some(content_type)) = (&self.acceptable_content_types, content_type)
        else {
            return true;
        };
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        types.iter().any(|t| t.eq_ignore_ascii_case(&essence))
    }
}

/// Request as seen by the caller once issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMetadata {
    pub id: Uuid,
    pub method: String,
    pub url: String,
    pub issued_at: DateTime<Utc>,
}

impl RequestMetadata {
    pub fn new(request: &FetchRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            method: request.method.clone(),
            url: request.url.clone(),
            issued_at: Utc::now(),
        }
    }
}

/// Response as reported by the collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub status: u16,
    pub url: String,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub received_at: DateTime<Utc>,
}

/// Successful fetch: decoded body text plus response metadata.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub response: ResponseMetadata,
    pub text: String,
}

/// Failed fetch, with response metadata when a response was received.
#[derive(Debug, Clone)]
pub struct TransportFailure {
    pub response: Option<ResponseMetadata>,
    pub error: TransportError,
}

impl TransportFailure {
    pub fn new(error: TransportError) -> Self {
        Self { response: None, error }
    }

    pub fn with_response(error: TransportError, response: ResponseMetadata) -> Self {
        Self { response: Some(response), error }
    }
}

impl From<TransportError> for TransportFailure {
    fn from(error: TransportError) -> Self {
        Self::new(error)
    }
}

/// Asynchronous fetch collaborator.
///
/// Each call completes exactly once with either a decoded body or a
/// transport failure. Encoding negotiation is the implementation's job.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedBody, TransportFailure>;
}
