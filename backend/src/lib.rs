//! # csvfetch - configurable CSV parsing and fetch-and-parse
//!
//! csvfetch turns delimited text into a table of rows under a small set of
//! parsing options, and wraps an HTTP fetch so that a remote CSV resource is
//! retrieved and parsed in one step.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ FetchRequest│────▶│    Fetch    │────▶│   Parser    │────▶│   Table /   │
//! │  (URL, ...) │     │  (reqwest)  │     │ (one pass)  │     │   failure   │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use csvfetch::{parse, ParseConfiguration};
//!
//! let config = ParseConfiguration::default().with_sanitize_fields(true);
//! let table = parse("name,quote\nAda,\"say \"\"hi\"\"\"", config).unwrap();
//! assert_eq!(table.rows()[1].fields(), ["Ada", "say \"hi\""]);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types
//! - [`parser`] - Configurable CSV parser, encoding and delimiter detection
//! - [`fetch`] - Fetch collaborator and the fetch-and-parse adapter
//! - [`config`] - Service configuration from the environment
//! - [`api`] - HTTP API server and log streaming

// Core modules
pub mod config;
pub mod error;

// Parsing
pub mod parser;

// Fetching
pub mod fetch;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigurationError, CsvError, CsvResult, FetchError, FetchResult, ParseError,
    ParseErrorKind, Position, ServerError, ServerResult, ServiceConfigError, TransportError,
};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse, parse_bytes, parse_file, Field,
    ParseConfiguration, Row, Table,
};

// =============================================================================
// Re-exports - Fetching
// =============================================================================

pub use fetch::{
    CsvFetcher, CsvResponse, Fetch, FetchFailure, FetchRequest, FetchedBody, HttpFetcher,
    RequestMetadata, ResponseMetadata, TransportFailure, CSV_CONTENT_TYPES,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::ServiceConfig;

// =============================================================================
// Re-exports - Server
// =============================================================================

pub mod server {
    pub use crate::api::server::{router, start_server};
}
