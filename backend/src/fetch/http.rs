//! HTTP fetch collaborator backed by `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE};

use super::{Fetch, FetchRequest, FetchedBody, ResponseMetadata, TransportFailure};
use crate::config::ServiceConfig;
use crate::error::{ServiceConfigError, TransportError};
use crate::parser::{decode_content, detect_encoding};

/// Fetches over HTTP(S), enforcing status, content type and body size.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    default_timeout: Duration,
    max_body_bytes: usize,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, ServiceConfigError> {
        Self::from_config(&ServiceConfig::default())
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self, ServiceConfigError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| ServiceConfigError::Client(e.to_string()))?;

        Ok(Self {
            client,
            default_timeout: config.timeout,
            max_body_bytes: config.max_body_bytes,
        })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedBody, TransportFailure> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|_| {
            TransportError::Request(format!("invalid HTTP method {:?}", request.method))
        })?;

        let mut builder = self
            .client
            .request(method, &request.url)
            .timeout(request.timeout.unwrap_or(self.default_timeout));

        let has_accept = request
            .headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case(ACCEPT.as_str()));
        if let (false, Some(types)) = (has_accept, &request.acceptable_content_types) {
            builder = builder.header(ACCEPT, types.join(", "));
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let mut response = builder.send().await.map_err(classify)?;
        let metadata = response_metadata(&response);

        let status = response.status();
        if !status.is_success() {
            let error = TransportError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            };
            return Err(TransportFailure::with_response(error, metadata));
        }

        if !request.accepts(metadata.content_type.as_deref()) {
            let found = metadata.content_type.clone().unwrap_or_default();
            return Err(TransportFailure::with_response(
                TransportError::UnacceptableContentType(found),
                metadata,
            ));
        }

        let too_large = || {
            TransportError::Body(format!("body exceeds {} bytes", self.max_body_bytes))
        };
        if response
            .content_length()
            .is_some_and(|len| len > self.max_body_bytes as u64)
        {
            return Err(TransportFailure::with_response(too_large(), metadata));
        }

        let mut body = Vec::new();
        loop {
            let chunk = match response.chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => return Err(TransportFailure::with_response(classify(e), metadata)),
            };
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(TransportFailure::with_response(too_large(), metadata));
            }
            body.extend_from_slice(&chunk);
        }

        match decode_body(&body, metadata.content_type.as_deref()) {
            Ok(text) => Ok(FetchedBody { response: metadata, text }),
            Err(message) => Err(TransportFailure::with_response(
                TransportError::Body(message),
                metadata,
            )),
        }
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_body() || err.is_decode() {
        TransportError::Body(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}

fn response_metadata(response: &reqwest::Response) -> ResponseMetadata {
    let headers = response.headers();
    ResponseMetadata {
        status: response.status().as_u16(),
        url: response.url().to_string(),
        content_type: header_str(headers, CONTENT_TYPE.as_str()),
        headers: headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect(),
        received_at: Utc::now(),
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// `charset` parameter of a content type header, if any.
fn charset_of(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}

/// Decode with the declared charset, or detect one when none is declared.
fn decode_body(bytes: &[u8], content_type: Option<&str>) -> Result<String, String> {
    let encoding = content_type
        .and_then(charset_of)
        .map(str::to_string)
        .unwrap_or_else(|| detect_encoding(bytes));

    decode_content(bytes, &encoding).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, StatusCode};
    use axum::routing::get;
    use axum::Router;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{}", addr)
    }

    fn test_app() -> Router {
        Router::new()
            .route(
                "/data.csv",
                get(|| async { ([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], "a,b\n1,2\n") }),
            )
            .route(
                "/latin1.csv",
                get(|| async {
                    (
                        [(header::CONTENT_TYPE, "text/csv; charset=ISO-8859-1")],
                        vec![b'c', b'a', b'f', 0xE9],
                    )
                }),
            )
            .route(
                "/data.json",
                get(|| async { ([(header::CONTENT_TYPE, "application/json")], "{}") }),
            )
            .route("/missing", get(|| async { (StatusCode::NOT_FOUND, "nope") }))
            .route(
                "/big.csv",
                get(|| async { ([(header::CONTENT_TYPE, "text/csv")], "x".repeat(4096)) }),
            )
    }

    fn fetcher() -> HttpFetcher {
        HttpFetcher::from_config(&ServiceConfig::default().with_max_body_bytes(1024)).unwrap()
    }

    #[test]
    fn test_charset_of() {
        assert_eq!(charset_of("text/csv; charset=utf-8"), Some("utf-8"));
        assert_eq!(charset_of("text/csv;Charset=\"ISO-8859-1\""), Some("ISO-8859-1"));
        assert_eq!(charset_of("text/csv"), None);
        assert_eq!(charset_of("text/csv; header=present"), None);
    }

    #[tokio::test]
    async fn test_fetch_csv_body() {
        let base = serve(test_app()).await;
        let body = fetcher()
            .fetch(&FetchRequest::csv(format!("{base}/data.csv")))
            .await
            .unwrap();

        assert_eq!(body.text, "a,b\n1,2\n");
        assert_eq!(body.response.status, 200);
        assert_eq!(
            body.response.content_type.as_deref(),
            Some("text/csv; charset=utf-8")
        );
    }

    #[tokio::test]
    async fn test_declared_charset_is_used() {
        let base = serve(test_app()).await;
        let body = fetcher()
            .fetch(&FetchRequest::csv(format!("{base}/latin1.csv")))
            .await
            .unwrap();
        assert_eq!(body.text, "café");
    }

    #[tokio::test]
    async fn test_error_status_keeps_response() {
        let base = serve(test_app()).await;
        let failure = fetcher()
            .fetch(&FetchRequest::get(format!("{base}/missing")))
            .await
            .unwrap_err();

        assert_eq!(
            failure.error,
            TransportError::Status { status: 404, reason: "Not Found".to_string() }
        );
        assert_eq!(failure.response.map(|r| r.status), Some(404));
    }

    #[tokio::test]
    async fn test_unacceptable_content_type() {
        let base = serve(test_app()).await;
        let failure = fetcher()
            .fetch(&FetchRequest::csv(format!("{base}/data.json")))
            .await
            .unwrap_err();
        assert_eq!(
            failure.error,
            TransportError::UnacceptableContentType("application/json".to_string())
        );

        let body = fetcher()
            .fetch(&FetchRequest::get(format!("{base}/data.json")))
            .await
            .unwrap();
        assert_eq!(body.text, "{}");
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let base = serve(test_app()).await;
        let failure = fetcher()
            .fetch(&FetchRequest::csv(format!("{base}/big.csv")))
            .await
            .unwrap_err();
        assert!(matches!(failure.error, TransportError::Body(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_has_no_response() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let failure = fetcher()
            .fetch(&FetchRequest::get(format!("http://{addr}/gone.csv")))
            .await
            .unwrap_err();
        assert!(failure.response.is_none());
        assert!(matches!(failure.error, TransportError::Request(_)));
    }

    #[tokio::test]
    async fn test_invalid_method() {
        let failure = fetcher()
            .fetch(&FetchRequest::get("http://127.0.0.1:9/").with_method("NOT A METHOD"))
            .await
            .unwrap_err();
        assert!(matches!(failure.error, TransportError::Request(_)));
    }
}
