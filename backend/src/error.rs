//! Error types for the csvfetch parser and fetch adapter.
//!
//! - [`ConfigurationError`] - invalid [`ParseConfiguration`](crate::ParseConfiguration)
//! - [`ParseError`] - malformed CSV structure, with a source [`Position`]
//! - [`CsvError`] - everything the synchronous parsing API can return
//! - [`TransportError`] - failures of the fetch collaborator
//! - [`FetchError`] - the tagged failure delivered by the adapter
//! - [`ServerError`] / [`ServiceConfigError`] - outer surfaces
//!
//! Conversion between layers is done with `From` so `?` works across them.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Invalid parse configuration. Raised before any scanning happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// The delimiter is the double quote character.
    #[error("delimiter must not be the double quote character")]
    DelimiterIsQuote,

    /// The delimiter is a row terminator.
    #[error("delimiter must not be a row terminator (got {0:?})")]
    DelimiterIsNewline(char),
}

// =============================================================================
// Parse Errors
// =============================================================================

/// Location in the source text.
///
/// `line` and `column` are 1-based and count characters, `offset` is the
/// 0-based byte offset into the input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Position {
    pub(crate) fn start() -> Self {
        Self { line: 1, column: 1, offset: 0 }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// What went wrong while scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "found", rename_all = "camelCase")]
pub enum ParseErrorKind {
    /// Input ended inside a quoted field.
    UnterminatedQuote,
    /// A character other than a delimiter, row terminator or whitespace
    /// followed a closing quote.
    UnexpectedAfterQuote(char),
}

/// Malformed CSV structure encountered mid-scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub position: Position,
}

impl ParseError {
    pub(crate) fn new(kind: ParseErrorKind, position: Position) -> Self {
        Self { kind, position }
    }

    /// Human-readable description without the position prefix.
    pub fn message(&self) -> String {
        match self.kind {
            ParseErrorKind::UnterminatedQuote => {
                "quoted field is not terminated before end of input".to_string()
            }
            ParseErrorKind::UnexpectedAfterQuote(c) => {
                format!("unexpected character {:?} after closing quote", c)
            }
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.position, self.message())
    }
}

// =============================================================================
// CSV Errors (synchronous API)
// =============================================================================

/// Errors returned by the parsing entry points.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Configuration was rejected before scanning.
    #[error("Invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Input is not valid CSV under the active configuration.
    #[error("Invalid CSV: {0}")]
    Parse(#[from] ParseError),

    /// Failed to read the input.
    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to decode the input bytes.
    #[error("Failed to decode input: {0}")]
    Encoding(String),
}

// =============================================================================
// Transport Errors
// =============================================================================

/// Failure of the fetch collaborator. Relayed unchanged by the adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request could not be sent or the connection failed.
    #[error("Request failed: {0}")]
    Request(String),

    /// The request did not complete in time.
    #[error("Request timed out")]
    Timeout,

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },

    /// The response content type is not one the request accepts.
    #[error("Unacceptable content type: {0}")]
    UnacceptableContentType(String),

    /// The body could not be read or decoded.
    #[error("Failed to read body: {0}")]
    Body(String),
}

// =============================================================================
// Fetch Errors (adapter)
// =============================================================================

/// Tagged failure delivered by the fetch-and-parse adapter.
///
/// Transport failures call for a retry, parse and configuration failures
/// call for fixing the data or the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The data could not be fetched.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The data was fetched but is not valid CSV.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// The adapter's configuration is invalid; nothing was fetched.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

impl FetchError {
    pub fn is_transport(&self) -> bool {
        matches!(self, FetchError::Transport(_))
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, FetchError::Parse(_))
    }
}

// =============================================================================
// Service Configuration Errors
// =============================================================================

/// Invalid environment configuration.
#[derive(Debug, Error)]
pub enum ServiceConfigError {
    #[error("Invalid value for {name}: {value:?} ({message})")]
    InvalidValue {
        name: &'static str,
        value: String,
        message: String,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Service configuration error: {0}")]
    Config(#[from] ServiceConfigError),

    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for parsing operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for adapter operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
