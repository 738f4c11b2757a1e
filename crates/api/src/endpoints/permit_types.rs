//! Permit type endpoints: lookup and submission.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
};
use permit_hub_common::AppResult;
use permit_hub_core::{CreatePermitRequestInput, PermitTypeDetail};
use serde::Deserialize;

use crate::{middleware::AppState, response::ApiResponse};

/// Permit type lookup query.
#[derive(Debug, Default, Deserialize)]
pub struct PermitTypeQuery {
    /// Prefer a type scoped to this subdistrict over the global one.
    pub subdistrict: Option<String>,
}

/// Get a permit type with its fields, flow and requirements.
async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PermitTypeQuery>,
) -> AppResult<ApiResponse<PermitTypeDetail>> {
    let detail = state
        .catalog
        .get_permit_type(&slug, query.subdistrict.as_deref())
        .await?;
    Ok(ApiResponse::ok(detail))
}

/// Submit a permit request for the type.
async fn submit(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(input): Json<CreatePermitRequestInput>,
) -> AppResult<impl IntoResponse> {
    let request = state.intake.create_permit_request(&slug, input).await?;
    Ok(ApiResponse::created(request))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{slug}", get(show))
        .route("/{slug}/requests", post(submit))
}
