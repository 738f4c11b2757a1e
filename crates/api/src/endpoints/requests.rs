//! Permit request endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
};
use chrono::{DateTime, Utc};
use permit_hub_common::AppResult;
use permit_hub_core::{
    DecisionOutcome, Direction, Page, PageRequest, RequestDetail, UpdateRequestInput,
};
use permit_hub_db::entities::{
    approval_decision, final_document, permit_request, permit_request::RequestStatus,
};
use permit_hub_db::repositories::{RequestFilter, RequestSortKey};
use serde::Deserialize;

use crate::{
    extractors::AuthCaller,
    middleware::AppState,
    response::{ApiResponse, no_content},
};

// ==================== Request Types ====================

/// List requests query. Every set filter must match.
#[derive(Debug, Default, Deserialize)]
pub struct ListRequestsQuery {
    pub company_id: Option<String>,
    /// One citizen id, or several separated by commas.
    pub citizen_id: Option<String>,
    pub submitted_from: Option<DateTime<Utc>>,
    pub submitted_to: Option<DateTime<Utc>>,
    pub status: Option<RequestStatus>,
    pub permit_type_id: Option<String>,
    pub subdistrict_id: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub sort: Option<RequestSortKey>,
    pub direction: Option<Direction>,
}

impl ListRequestsQuery {
    fn filter(&self) -> RequestFilter {
        RequestFilter {
            company_id: self.company_id.clone(),
            citizen_ids: self
                .citizen_id
                .as_deref()
                .map(|ids| {
                    ids.split(',')
                        .map(str::trim)
                        .filter(|id| !id.is_empty())
                        .map(ToString::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            submitted_from: self.submitted_from,
            submitted_to: self.submitted_to,
            status: self.status,
            permit_type_id: self.permit_type_id.clone(),
            subdistrict_id: self.subdistrict_id.clone(),
        }
    }

    fn page(&self) -> PageRequest {
        let defaults = PageRequest::default();
        PageRequest {
            page: self.page.unwrap_or(defaults.page),
            per_page: self.per_page.unwrap_or(defaults.per_page),
            sort: self.sort.unwrap_or(defaults.sort),
            direction: self.direction.unwrap_or(defaults.direction),
        }
    }
}

/// Decision body.
#[derive(Debug, Deserialize)]
pub struct DecideRequest {
    pub approved: bool,
    pub note: Option<String>,
}

// ==================== Handlers ====================

async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListRequestsQuery>,
) -> AppResult<ApiResponse<Page<permit_request::Model>>> {
    let page = state
        .query
        .list_requests(&query.filter(), query.page())
        .await?;
    Ok(ApiResponse::ok(page))
}

async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<RequestDetail>> {
    let detail = state.query.get_request(&id).await?;
    Ok(ApiResponse::ok(detail))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateRequestInput>,
) -> AppResult<ApiResponse<permit_request::Model>> {
    let request = state.query.update_request(&id, input).await?;
    Ok(ApiResponse::ok(request))
}

async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    state.query.delete_request(&id).await?;
    Ok(no_content())
}

/// Record a decision on the request's current step.
async fn decide(
    State(state): State<AppState>,
    AuthCaller(caller): AuthCaller,
    Path(id): Path<String>,
    Json(body): Json<DecideRequest>,
) -> AppResult<ApiResponse<DecisionOutcome>> {
    let outcome = state
        .evaluator
        .decide(&id, &caller, body.note, body.approved)
        .await?;
    Ok(ApiResponse::ok(outcome))
}

async fn decisions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Vec<approval_decision::Model>>> {
    let decisions = state.query.decisions(&id).await?;
    Ok(ApiResponse::ok(decisions))
}

async fn documents(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Vec<final_document::Model>>> {
    let documents = state.query.final_documents(&id).await?;
    Ok(ApiResponse::ok(documents))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/{id}", get(show).patch(update).delete(delete))
        .route("/{id}/decisions", get(decisions).post(decide))
        .route("/{id}/documents", get(documents))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_citizen_ids_split() {
        let query = ListRequestsQuery {
            citizen_id: Some("c1, c2,,".to_string()),
            ..Default::default()
        };

        assert_eq!(query.filter().citizen_ids, vec!["c1", "c2"]);
    }

    #[test]
    fn test_page_defaults() {
        let page = ListRequestsQuery {
            per_page: Some(5),
            ..Default::default()
        }
        .page();

        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, 5);
        assert_eq!(page.sort, RequestSortKey::CreatedAt);
        assert_eq!(page.direction, Direction::Desc);
    }
}
