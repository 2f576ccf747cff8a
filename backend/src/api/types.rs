//! REST API types.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{CsvError, FetchError};
use crate::fetch::{CsvResponse, FetchFailure, RequestMetadata, ResponseMetadata};
use crate::parser::{ParseConfiguration, Table};

/// Body of `POST /api/fetch`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchPayload {
    pub url: String,
    #[serde(default)]
    pub config: ParseConfiguration,
    /// Skip the CSV content type check.
    #[serde(default)]
    pub accept_any_content_type: bool,
}

/// Response of `POST /api/parse`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResponse {
    pub status: String,
    pub row_count: usize,
    pub max_width: usize,
    pub rows: Table,
}

impl From<Table> for ParseResponse {
    fn from(table: Table) -> Self {
        Self {
            status: "ok".to_string(),
            row_count: table.len(),
            max_width: table.max_width(),
            rows: table,
        }
    }
}

/// Response of `POST /api/fetch`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResponse {
    pub status: String,
    pub request: RequestMetadata,
    pub response: ResponseMetadata,
    pub row_count: usize,
    pub max_width: usize,
    pub rows: Table,
}

impl From<CsvResponse> for FetchResponse {
    fn from(csv: CsvResponse) -> Self {
        Self {
            status: "ok".to_string(),
            request: csv.request,
            response: csv.response,
            row_count: csv.table.len(),
            max_width: csv.table.max_width(),
            rows: csv.table,
        }
    }
}

/// Error body for a failed parse.
pub fn parse_error_response(error: &CsvError) -> Value {
    let (kind, position) = match error {
        CsvError::Configuration(_) => ("configuration", None),
        CsvError::Parse(e) => ("parse", Some(e.position)),
        CsvError::Io(_) => ("io", None),
        CsvError::Encoding(_) => ("encoding", None),
    };
    error_response(kind, &error.to_string(), json!(position))
}

/// Error body for a failed fetch, with whatever metadata is available.
pub fn fetch_error_response(failure: &FetchFailure) -> Value {
    let (kind, position) = match &failure.error {
        FetchError::Transport(_) => ("transport", None),
        FetchError::Parse(e) => ("parse", Some(e.position)),
        FetchError::Configuration(_) => ("configuration", None),
    };
    let mut body = error_response(kind, &failure.error.to_string(), json!(position));
    body["request"] = json!(failure.request);
    body["response"] = json!(failure.response);
    body
}

/// Create an error response
pub fn error_response(kind: &str, error: &str, position: Value) -> Value {
    json!({
        "status": "error",
        "kind": kind,
        "error": error,
        "position": position,
        "rows": [],
    })
}
