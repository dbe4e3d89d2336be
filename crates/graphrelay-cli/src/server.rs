//! HTTP boundary for the relay pipeline.
//!
//! Routes:
//! - `POST /query`  — validate, normalize, relay, answer
//! - `GET /healthz` — liveness
//! - `GET /status`  — configuration snapshot
//!
//! Error envelopes, kept on two structurally separate paths:
//! - stage failures: 500 `{"message": "Failed doing <stage>: <remote body>"}`
//! - anything else uncaught: 500 `{"message": ...}`, logged, no stage label
//! - structurally invalid inbound documents: 400, before any outbound call

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE,
};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use tokio::net::TcpListener;

use graphrelay_core::{Pipeline, Query, RelayConfig, RelayError, Response, Stage};

type HttpResponse = hyper::Response<Full<Bytes>>;

struct ServerState {
    config: RelayConfig,
    pipeline: Pipeline,
}

pub(crate) async fn serve(config: RelayConfig, ready_file: Option<PathBuf>) -> Result<()> {
    let pipeline = crate::build_pipeline(&config)?;
    let listener = TcpListener::bind(config.listen)
        .await
        .map_err(|e| anyhow!("serve: failed to bind {}: {e}", config.listen))?;
    let bound = listener
        .local_addr()
        .map_err(|e| anyhow!("serve: failed to read bound addr: {e}"))?;

    tracing::info!(addr = %bound, "graphrelay listening");
    if let Some(path) = ready_file.as_ref() {
        let payload = serde_json::json!({
            "version": "graphrelay_ready_v1",
            "addr": bound.to_string(),
            "pid": std::process::id(),
        });
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        std::fs::write(path, serde_json::to_string_pretty(&payload).unwrap_or_default()).ok();
    }

    run(listener, Arc::new(ServerState { config, pipeline })).await
}

/// Accept loop: one task per connection, no shared request state beyond the
/// pooled outbound client inside the pipeline.
async fn run(listener: TcpListener, state: Arc<ServerState>) -> Result<()> {
    loop {
        let (stream, _peer) = listener
            .accept()
            .await
            .map_err(|e| anyhow!("serve: accept failed: {e}"))?;
        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| handle_request(req, state.clone()));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                tracing::debug!("connection error: {e}");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    state: Arc<ServerState>,
) -> Result<HttpResponse, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let resp = match (method, path.as_str()) {
        (Method::OPTIONS, _) => preflight_response(),
        (Method::GET, "/healthz") => text_response(StatusCode::OK, "ok\n"),
        (Method::GET, "/status") => json_response(StatusCode::OK, &status_payload(&state)),
        (Method::POST, "/query") => {
            let body = req.into_body().collect().await?.to_bytes();
            handle_query(&state, &body).await
        }
        _ => json_error(StatusCode::NOT_FOUND, "not found"),
    };

    Ok(resp)
}

async fn handle_query(state: &ServerState, body: &[u8]) -> HttpResponse {
    // Structural validation happens here, before any outbound call.
    let query: Query = match serde_json::from_slice(body) {
        Ok(q) => q,
        Err(e) => {
            return json_error(
                StatusCode::BAD_REQUEST,
                &format!("failed to parse query document: {e}"),
            );
        }
    };

    match state.pipeline.run(query).await {
        Ok(answer) => match serde_json::from_value::<Response>(answer) {
            Ok(response) => json_response(StatusCode::OK, &response),
            Err(e) => {
                tracing::error!("scoring stage produced a malformed answer document: {e}");
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &format!("malformed answer document: {e}"),
                )
            }
        },
        Err(err) => failure_response(err),
    }
}

/// Map a pipeline failure to its client-visible envelope.
///
/// Stage-attributed failures carry the remote diagnostic text; everything
/// else is the catch-all path and gets logged with full detail first.
fn failure_response(err: RelayError) -> HttpResponse {
    match err.attributed_stage() {
        Some(stage) => {
            tracing::warn!(stage = stage.name(), "stage failure: {err}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
        }
        None => {
            tracing::error!("relay failed outside the stage chain: {err:#}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
        }
    }
}

fn status_payload(state: &ServerState) -> serde_json::Value {
    let endpoints = state.pipeline.endpoints();
    serde_json::json!({
        "version": "graphrelay_status_v1",
        "listen": state.config.listen.to_string(),
        "stages": Stage::ALL.iter().map(|s| serde_json::json!({
            "stage": s.name(),
            "endpoint": endpoints.url(*s).to_string(),
        })).collect::<Vec<_>>(),
        "normalizer": state.config.normalizer_url.as_ref().map(|u| u.to_string()),
        "request_timeout_secs": state.config.request_timeout.map(|d| d.as_secs()),
    })
}

fn with_cors(builder: hyper::http::response::Builder) -> hyper::http::response::Builder {
    builder
        .header(ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .header(ACCESS_CONTROL_ALLOW_METHODS, "*")
        .header(ACCESS_CONTROL_ALLOW_HEADERS, "*")
}

fn preflight_response() -> HttpResponse {
    with_cors(hyper::Response::builder().status(StatusCode::NO_CONTENT))
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|_| hyper::Response::new(Full::new(Bytes::new())))
}

fn text_response(status: StatusCode, body: &str) -> HttpResponse {
    with_cors(hyper::Response::builder().status(status))
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap_or_else(|_| hyper::Response::new(Full::new(Bytes::from_static(b"internal error"))))
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> HttpResponse {
    let body = serde_json::to_vec(value).unwrap_or_else(|_| b"{\"message\":\"serialize\"}".to_vec());
    with_cors(hyper::Response::builder().status(status))
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| {
            hyper::Response::new(Full::new(Bytes::from_static(b"{\"message\":\"internal\"}")))
        })
}

/// The generic error envelope: `{"message": <text>}`.
fn json_error(status: StatusCode, msg: &str) -> HttpResponse {
    let v = serde_json::json!({ "message": msg });
    json_response(status, &v)
}

// ============================================================================
// Boundary tests (mock downstream services on 127.0.0.1:0)
// ============================================================================
