//! Artifact download.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use reel_models::{ArtifactId, ArtifactKind};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// `GET /artifacts/:kind/:id`: the verified, reassembled artifact bytes.
pub async fn get_artifact(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> ApiResult<Response> {
    let kind: ArtifactKind = kind
        .parse()
        .map_err(|e: reel_models::ArtifactKindParseError| ApiError::not_found(e.to_string()))?;
    let id = ArtifactId::from_string(id);

    let manifest = state.store.manifest(kind, &id).await?;
    let data = state.store.get(kind, &id).await?;

    Ok((
        [
            (header::CONTENT_TYPE, manifest.media_type.content_type().to_string()),
            (header::CACHE_CONTROL, "private, max-age=3600".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}.{}\"", id, manifest.media_type.extension()),
            ),
        ],
        data,
    )
        .into_response())
}
