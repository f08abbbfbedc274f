//! Differential diagnosis endpoint.

use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::reasoning::types::{DiagnosisCondition, DiagnosisRequest};

/// `POST /api/diagnose`: differential list, unfiltered. Thresholding and
/// sorting happen on the caller's side.
pub async fn diagnose(
    State(ctx): State<ApiContext>,
    Json(request): Json<DiagnosisRequest>,
) -> Result<Json<Vec<DiagnosisCondition>>, ApiError> {
    if request.symptom.trim().is_empty() {
        return Err(ApiError::BadRequest("Symptom must not be empty".into()));
    }

    let backend = ctx.backend.clone();
    let conditions = tokio::task::spawn_blocking(move || backend.diagnose_symptoms(&request))
        .await
        .map_err(|e| ApiError::Internal(format!("diagnosis task failed: {e}")))??;

    tracing::info!(count = conditions.len(), "Diagnosis served");
    Ok(Json(conditions))
}
