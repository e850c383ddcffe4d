//! Streaming reel generation.
//!
//! The job runs in its own task and reports through a [`ProgressEmitter`];
//! this handler only forwards events as NDJSON lines. When the job is quiet
//! for a heartbeat interval a `progress` line is sent so that proxies in
//! front of the service never see an idle connection.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::Stream;
use tokio::sync::mpsc;

use reel_models::{GenerateReelRequest, JobId, ProgressEvent};
use reel_worker::{run_streaming_job, JobLogger, ProgressEmitter};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

const HEARTBEAT_MESSAGE: &str = "Still working...";

/// `POST /generate-reel`: run a reel job and stream its progress.
///
/// Validation failures are plain HTTP 400 errors; once the stream has
/// started every failure arrives as a `failed` line instead.
pub async fn generate_reel(
    State(state): State<AppState>,
    Json(request): Json<GenerateReelRequest>,
) -> ApiResult<Response> {
    let pipeline = state
        .pipeline
        .clone()
        .ok_or_else(|| ApiError::not_found("Reel generation is not served in this mode"))?;
    request.validate(pipeline.max_clips())?;

    let job_id = JobId::new();
    // The `starting` event is logged by the stream as it goes out.
    let logger = JobLogger::new(&job_id, "reel");

    let (emitter, events) = ProgressEmitter::channel(format!("Generating reel: {}", request.headline));
    tokio::spawn({
        let pipeline = Arc::clone(&pipeline);
        async move {
            // The outcome already went out as the terminal event.
            let _ = run_streaming_job(&pipeline, &job_id, request, emitter).await;
        }
    });

    let body = Body::from_stream(ndjson_stream(
        events,
        state.config.api.heartbeat_interval,
        logger,
    ));

    Ok((
        [
            (header::CONTENT_TYPE, NDJSON_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
            (header::HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        body,
    )
        .into_response())
}

/// Forward events as NDJSON lines, inserting heartbeats while idle.
///
/// Ends right after the terminal event, or when the job side hangs up.
fn ndjson_stream(
    mut events: mpsc::UnboundedReceiver<ProgressEvent>,
    heartbeat: Duration,
    logger: JobLogger,
) -> impl Stream<Item = Result<String, serde_json::Error>> + Send + 'static {
    async_stream::stream! {
        let _open = OpenStream::new();
        loop {
            match tokio::time::timeout(heartbeat, events.recv()).await {
                Ok(Some(event)) => {
                    logger.log_event(&event);
                    metrics::record_stream_event(event.status.as_str());
                    let terminal = event.is_terminal();
                    yield event.to_ndjson_line();
                    if terminal {
                        break;
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    metrics::record_heartbeat();
                    yield ProgressEvent::progress(HEARTBEAT_MESSAGE).to_ndjson_line();
                }
            }
        }
    }
}

/// Keeps the active-stream gauge right when a client disconnects mid-job.
struct OpenStream;

impl OpenStream {
    fn new() -> Self {
        metrics::stream_opened();
        Self
    }
}

impl Drop for OpenStream {
    fn drop(&mut self) {
        metrics::stream_closed();
    }
}
