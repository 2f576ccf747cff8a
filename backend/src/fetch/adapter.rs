//! The fetch-and-parse adapter.
//!
//! [`CsvFetcher`] drives one [`Fetch`] collaborator and parses whatever
//! body it delivers with the adapter's [`ParseConfiguration`]. Every
//! request ends in exactly one outcome:
//!
//! - [`CsvResponse`] when the body was fetched and parsed,
//! - [`FetchFailure`] carrying a [`FetchError`] otherwise.
//!
//! # Example
//! ```rust,ignore
//! use csvfetch::{CsvFetcher, FetchRequest, HttpFetcher, ParseConfiguration};
//!
//! let fetcher = CsvFetcher::new(HttpFetcher::new()?)
//!     .with_config(ParseConfiguration::default().with_sanitize_fields(true));
//!
//! match fetcher.fetch(FetchRequest::csv("https://example.com/prices.csv")).await {
//!     Ok(csv) => println!("{} rows", csv.table.len()),
//!     Err(failure) if failure.error.is_transport() => eprintln!("retry later: {failure}"),
//!     Err(failure) => eprintln!("bad data: {failure}"),
//! }
//! ```

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;

use super::{Fetch, FetchRequest, RequestMetadata, ResponseMetadata};
use crate::api::logs::{log_error, log_info, log_info_indent, log_success, log_warning};
use crate::error::FetchError;
use crate::parser::{scanner, ParseConfiguration, Table};

/// A fetched and parsed table with the metadata of its exchange.
#[derive(Debug, Clone)]
pub struct CsvResponse {
    pub request: RequestMetadata,
    pub response: ResponseMetadata,
    pub table: Table,
}

/// A failed fetch-and-parse. No table is recovered from a failure.
#[derive(Debug, Clone, Error)]
#[error("{error}")]
pub struct FetchFailure {
    pub request: RequestMetadata,
    /// Present whenever a response was received, even if it was rejected.
    pub response: Option<ResponseMetadata>,
    pub error: FetchError,
}

/// Fetch-and-parse adapter owning one parse configuration.
pub struct CsvFetcher<F> {
    fetcher: Arc<F>,
    config: ParseConfiguration,
}

impl<F> Clone for CsvFetcher<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            config: self.config,
        }
    }
}

impl<F: Fetch + 'static> CsvFetcher<F> {
    pub fn new(fetcher: F) -> Self {
        Self::shared(Arc::new(fetcher))
    }

    /// Build an adapter around a collaborator shared with other adapters.
    pub fn shared(fetcher: Arc<F>) -> Self {
        Self {
            fetcher,
            config: ParseConfiguration::default(),
        }
    }

    pub fn with_config(mut self, config: ParseConfiguration) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> ParseConfiguration {
        self.config
    }

    /// Replace the configuration. Requests already initiated keep the
    /// configuration they started with.
    pub fn set_config(&mut self, config: ParseConfiguration) {
        self.config = config;
    }

    /// Fetch `request` and parse the body.
    pub async fn fetch(&self, request: FetchRequest) -> Result<CsvResponse, FetchFailure> {
        fetch_and_parse(self.fetcher.as_ref(), request, self.config).await
    }

    /// Run the fetch on the tokio runtime and invoke exactly one of the two
    /// continuations when it completes.
    ///
    /// Aborting the returned handle before completion invokes neither, and
    /// the body of an aborted fetch is never parsed.
    pub fn spawn<S, E>(&self, request: FetchRequest, on_success: S, on_failure: E) -> JoinHandle<()>
    where
        S: FnOnce(CsvResponse) + Send + 'static,
        E: FnOnce(FetchFailure) + Send + 'static,
    {
        let fetcher = Arc::clone(&self.fetcher);
        let config = self.config;

        tokio::spawn(async move {
            match fetch_and_parse(fetcher.as_ref(), request, config).await {
                Ok(response) => on_success(response),
                Err(failure) => on_failure(failure),
            }
        })
    }
}

async fn fetch_and_parse<F: Fetch + ?Sized>(
    fetcher: &F,
    request: FetchRequest,
    config: ParseConfiguration,
) -> Result<CsvResponse, FetchFailure> {
    let metadata = RequestMetadata::new(&request);
    log_info(format!("📡 {} {} [{}]", metadata.method, metadata.url, metadata.id));

    if let Err(e) = config.validate() {
        log_error(format!("Configuration rejected: {}", e));
        return Err(FetchFailure {
            request: metadata,
            response: None,
            error: e.into(),
        });
    }

    let body = match fetcher.fetch(&request).await {
        Ok(body) => body,
        Err(failure) => {
            log_error(format!("Fetch failed: {}", failure.error));
            return Err(FetchFailure {
                request: metadata,
                response: failure.response,
                error: failure.error.into(),
            });
        }
    };
    log_info_indent(
        format!("Received {} bytes (HTTP {})", body.text.len(), body.response.status),
        1,
    );

    match scanner::scan(&body.text, config) {
        Ok(table) => {
            if table.is_empty() {
                log_warning("Response body contained no rows");
            }
            log_success(format!("Parsed {} rows", table.len()));
            Ok(CsvResponse {
                request: metadata,
                response: body.response,
                table,
            })
        }
        Err(e) => {
            log_error(format!("Invalid CSV: {}", e));
            Err(FetchFailure {
                request: metadata,
                response: Some(body.response),
                error: e.into(),
            })
        }
    }
}
