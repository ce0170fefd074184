//! HTTP request handlers.

use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::dialect::{model_name, LineEvent, UpstreamDialect};
use super::lines::LineBuffer;
use super::server::AppState;
use super::types::GenerationRequest;
use crate::error::Error;

/// SSE terminal sentinel frame.
const DONE_FRAME: &[u8] = b"data: [DONE]\n\n";

/// Capacity of the frame channel between the upstream pump and the client
/// body. Bounded so a slow client backpressures the upstream read.
const FRAME_CHANNEL_CAPACITY: usize = 32;

/// Handle POST /api/stream-proxy
///
/// Validates the request, issues the dialect-shaped upstream call, and
/// answers with a normalized SSE stream. Everything that fails before the
/// stream opens becomes an ordinary HTTP error; failures after that are
/// delivered as in-band error frames.
pub async fn stream_proxy(
    State(state): State<AppState>,
    Json(request): Json<GenerationRequest>,
) -> Result<Response, Error> {
    if request.target_url.is_empty() {
        return Err(Error::MissingTarget);
    }

    let dialect = UpstreamDialect::from_request(request.is_ollama);
    let url = dialect.endpoint_url(&request.target_url);
    let shaped_body = dialect.shape_body(&request.body);
    let model = model_name(&request.body).to_string();

    tracing::info!(url = %url, dialect = ?dialect, model = %model, "Relaying generation request");

    let mut upstream_request = state
        .http_client
        .post(&url)
        .timeout(Duration::from_secs(state.config.upstream.timeout_secs));

    if dialect.forwards_caller_headers() {
        for (name, value) in &request.headers {
            upstream_request = upstream_request.header(name.as_str(), value.as_str());
        }
    }

    // json() adds Content-Type: application/json only when the caller did
    // not supply one, same merge the browser layer expects.
    let upstream_response = upstream_request.json(&shaped_body).send().await.map_err(|e| {
        tracing::error!(error = %e, url = %url, "Failed to reach upstream");
        Error::Upstream(e)
    })?;

    let status = upstream_response.status();
    if !status.is_success() {
        let body = upstream_response.text().await.unwrap_or_default();
        tracing::error!(status = %status, body = %body, "Upstream returned error");
        return Err(Error::UpstreamStatus {
            status: status.as_u16(),
            body,
        });
    }

    // 2xx: open the normalized event stream. A spawned pump owns the
    // upstream connection; dropping the client body drops the receiver,
    // which ends the pump and aborts the upstream call.
    let (tx, rx) = mpsc::channel::<Bytes>(FRAME_CHANNEL_CAPACITY);
    tokio::spawn(pump_upstream(upstream_response, dialect, model, tx));

    let body = Body::from_stream(
        ReceiverStream::new(rx).map(Ok::<_, std::convert::Infallible>),
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(body)
        .map_err(|e| Error::Internal(e.to_string()))
}

/// Outcome of forwarding one upstream line.
enum Forward {
    /// Keep reading.
    Continue,
    /// Sentinel sent or client gone; stop reading.
    Stop,
}

/// Read the upstream body to completion, translating lines into SSE frames.
///
/// Frames are emitted in exact upstream line order. Decode warnings are
/// logged and skipped. On a transport error mid-stream one final error
/// frame is emitted, then the channel closes; the client never waits past
/// the upstream's own termination or the request timeout.
async fn pump_upstream(
    upstream: reqwest::Response,
    dialect: UpstreamDialect,
    model: String,
    tx: mpsc::Sender<Bytes>,
) {
    let mut byte_stream = upstream.bytes_stream();
    let mut buffer = LineBuffer::new();

    loop {
        // The upstream read races against client disconnect; a stalled
        // upstream must not hold its connection open once the client is
        // gone. Returning here drops `byte_stream`, aborting the upstream
        // call.
        let chunk = tokio::select! {
            _ = tx.closed() => {
                tracing::debug!("Client disconnected, aborting upstream read");
                return;
            }
            chunk = byte_stream.next() => chunk,
        };

        let bytes = match chunk {
            Some(Ok(bytes)) => bytes,
            Some(Err(e)) => {
                tracing::error!(error = %e, "Error streaming from upstream");
                send_error_frame(&tx, &e.to_string()).await;
                return;
            }
            None => break,
        };

        for line in buffer.feed(&bytes) {
            if let Forward::Stop = forward_line(&dialect, &line, &model, &tx).await {
                return;
            }
        }
    }

    // Upstream closed cleanly; a trailing unterminated line may still hold
    // a frame (some backends omit the final newline).
    if let Some(line) = buffer.flush() {
        let _ = forward_line(&dialect, &line, &model, &tx).await;
    }
}

/// Translate one complete line and send the resulting frame(s).
async fn forward_line(
    dialect: &UpstreamDialect,
    line: &str,
    model: &str,
    tx: &mpsc::Sender<Bytes>,
) -> Forward {
    match dialect.decode_line(line, model) {
        Ok(LineEvent::Skip) => Forward::Continue,
        Ok(LineEvent::Frame(value)) => send_frame(tx, &value).await,
        Ok(LineEvent::FinalFrame(value)) => {
            if let Forward::Stop = send_frame(tx, &value).await {
                return Forward::Stop;
            }
            send_sentinel(tx).await;
            Forward::Stop
        }
        Ok(LineEvent::Done) => {
            send_sentinel(tx).await;
            Forward::Stop
        }
        Err(warning) => {
            tracing::warn!(reason = %warning.reason, line = %warning.line, "Skipping undecodable upstream line");
            Forward::Continue
        }
    }
}

/// Serialize one JSON value as an SSE data frame and send it.
async fn send_frame(tx: &mpsc::Sender<Bytes>, value: &serde_json::Value) -> Forward {
    let payload = match serde_json::to_string(value) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, "Dropping unserializable frame");
            return Forward::Continue;
        }
    };

    match tx.send(Bytes::from(format!("data: {}\n\n", payload))).await {
        Ok(()) => Forward::Continue,
        // Receiver dropped: the client disconnected.
        Err(_) => Forward::Stop,
    }
}

async fn send_sentinel(tx: &mpsc::Sender<Bytes>) {
    let _ = tx.send(Bytes::from_static(DONE_FRAME)).await;
}

async fn send_error_frame(tx: &mpsc::Sender<Bytes>, message: &str) {
    let frame = serde_json::json!({ "error": { "message": message } });
    let _ = send_frame(tx, &frame).await;
}

/// Handle GET /health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "inkrelay"
    }))
}
