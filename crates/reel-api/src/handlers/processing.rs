//! Processor endpoint.

use axum::extract::State;
use axum::Json;

use reel_models::{ProcessClipsRequest, ProcessClipsResponse};

use crate::error::ApiResult;
use crate::state::AppState;

/// `POST /process-clips`: assemble the clips and report where the result
/// was stored. Blocks until assembly finishes.
pub async fn process_clips(
    State(state): State<AppState>,
    Json(request): Json<ProcessClipsRequest>,
) -> ApiResult<Json<ProcessClipsResponse>> {
    let response = state.processor.process(request).await?;
    Ok(Json(response))
}
