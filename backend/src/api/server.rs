//! HTTP server for the csvfetch API.
//!
//! # API Endpoints
//!
//! | Method | Path          | Description                                   |
//! |--------|---------------|-----------------------------------------------|
//! | GET    | `/health`     | Health check                                  |
//! | POST   | `/api/parse`  | Parse the raw request body; options in query  |
//! | POST   | `/api/fetch`  | Fetch a remote CSV and parse it               |
//! | GET    | `/api/logs`   | SSE stream for real-time logs                 |

use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, LOG_BROADCASTER};
use super::types::{
    fetch_error_response, parse_error_response, FetchPayload, FetchResponse, ParseResponse,
};
use crate::config::ServiceConfig;
use crate::error::{CsvError, FetchError, ServerResult};
use crate::fetch::{CsvFetcher, FetchRequest, HttpFetcher};
use crate::parser::{parse_bytes, ParseConfiguration};

type ApiError = (StatusCode, Json<Value>);

#[derive(Clone)]
struct AppState {
    fetcher: Arc<HttpFetcher>,
}

/// Build the router. Split from [`start_server`] so it can be served on any
/// listener.
pub fn router(config: &ServiceConfig) -> ServerResult<Router> {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    let state = AppState {
        fetcher: Arc::new(HttpFetcher::from_config(config)?),
    };

    Ok(Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/parse", post(parse_body))
        .route("/api/fetch", post(fetch_csv))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(state))
}

/// Start the HTTP server
pub async fn start_server(config: ServiceConfig) -> ServerResult<()> {
    let app = router(&config)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    println!("🚀 csvfetch server running on http://localhost:{}", config.port);
    println!("   POST /api/parse  - Parse a CSV body");
    println!("   POST /api/fetch  - Fetch and parse a remote CSV");
    println!("   GET  /api/logs   - SSE log stream");
    println!("   GET  /health     - Health check");
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "csvfetch",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "parse": "POST /api/parse",
            "fetch": "POST /api/fetch",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Parse the request body with the options given in the query string.
async fn parse_body(
    Query(config): Query<ParseConfiguration>,
    body: Bytes,
) -> Result<Json<ParseResponse>, ApiError> {
    log_info(format!("📄 Parsing {} bytes", body.len()));

    let table = parse_bytes(&body, config).map_err(|e| {
        log_error(format!("Parse failed: {}", e));
        (parse_status(&e), Json(parse_error_response(&e)))
    })?;

    Ok(Json(ParseResponse::from(table)))
}

/// Fetch a remote CSV and parse it.
async fn fetch_csv(
    State(state): State<AppState>,
    Json(payload): Json<FetchPayload>,
) -> Result<Json<FetchResponse>, ApiError> {
    let mut request = FetchRequest::csv(payload.url);
    if payload.accept_any_content_type {
        request = request.accept_any_content_type();
    }

    let fetcher = CsvFetcher::shared(Arc::clone(&state.fetcher)).with_config(payload.config);
    match fetcher.fetch(request).await {
        Ok(csv) => Ok(Json(FetchResponse::from(csv))),
        Err(failure) => Err((
            fetch_status(&failure.error),
            Json(fetch_error_response(&failure)),
        )),
    }
}

fn parse_status(error: &CsvError) -> StatusCode {
    match error {
        CsvError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn fetch_status(error: &FetchError) -> StatusCode {
    match error {
        FetchError::Transport(_) => StatusCode::BAD_GATEWAY,
        FetchError::Parse(_) | FetchError::Configuration(_) => StatusCode::BAD_REQUEST,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::CONTENT_TYPE;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{}", addr)
    }

    async fn api() -> String {
        LOG_BROADCASTER.set_echo(false);
        serve(router(&ServiceConfig::default()).unwrap()).await
    }

    async fn upstream() -> String {
        serve(
            Router::new()
                .route(
                    "/ok.csv",
                    get(|| async { ([(CONTENT_TYPE, "text/csv")], "x;y\n1;2\n") }),
                )
                .route(
                    "/bad.csv",
                    get(|| async { ([(CONTENT_TYPE, "text/csv")], "\"open\n") }),
                ),
        )
        .await
    }

    #[tokio::test]
    async fn test_health() {
        let base = api().await;
        let body: Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "csvfetch");
    }

    #[tokio::test]
    async fn test_parse_endpoint_with_query_options() {
        let base = api().await;
        let response = reqwest::Client::new()
            .post(format!("{base}/api/parse?delimiter=%3B&trimWhitespace=true"))
            .body("a ; b\nc;d")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["rowCount"], 2);
        assert_eq!(body["rows"], json!([["a", "b"], ["c", "d"]]));
    }

    #[tokio::test]
    async fn test_parse_endpoint_reports_position() {
        let base = api().await;
        let response = reqwest::Client::new()
            .post(format!("{base}/api/parse"))
            .body("a,\"b")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["kind"], "parse");
        assert_eq!(body["position"]["column"], 3);
    }

    #[tokio::test]
    async fn test_fetch_endpoint() {
        let base = api().await;
        let origin = upstream().await;

        let response = reqwest::Client::new()
            .post(format!("{base}/api/fetch"))
            .json(&json!({ "url": format!("{origin}/ok.csv"), "config": { "delimiter": ";" } }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["rows"], json!([["x", "y"], ["1", "2"]]));
        assert_eq!(body["response"]["status"], 200);
        assert_eq!(body["request"]["method"], "GET");
    }

    #[tokio::test]
    async fn test_fetch_endpoint_parse_failure() {
        let base = api().await;
        let origin = upstream().await;

        let response = reqwest::Client::new()
            .post(format!("{base}/api/fetch"))
            .json(&json!({ "url": format!("{origin}/bad.csv") }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["kind"], "parse");
        assert_eq!(body["response"]["status"], 200);
    }

    #[tokio::test]
    async fn test_fetch_endpoint_transport_failure() {
        let base = api().await;
        let origin = upstream().await;

        let response = reqwest::Client::new()
            .post(format!("{base}/api/fetch"))
            .json(&json!({ "url": format!("{origin}/missing.csv") }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 502);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["kind"], "transport");
        assert_eq!(body["response"]["status"], 404);
    }
}
