//! Interactive turn endpoint.

use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::reasoning::types::{ModelResponse, TurnRequest};

/// `POST /api/interactive`: one conversation turn.
///
/// The body carries the whole history. The response is exactly one
/// variant: question, summary or error.
pub async fn respond(
    State(ctx): State<ApiContext>,
    Json(request): Json<TurnRequest>,
) -> Result<Json<ModelResponse>, ApiError> {
    if request.symptom.trim().is_empty() {
        return Err(ApiError::BadRequest("Symptom must not be empty".into()));
    }

    let backend = ctx.backend.clone();
    let response = tokio::task::spawn_blocking(move || backend.interactive_response(&request))
        .await
        .map_err(|e| ApiError::Internal(format!("interactive task failed: {e}")))??;

    tracing::info!(kind = response.kind(), "Interactive turn served");
    Ok(Json(response))
}
