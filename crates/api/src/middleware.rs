//! API middleware and shared state.

#![allow(missing_docs)]

use std::sync::Arc;

use axum::{body::Body, http::HeaderMap, http::Request, middleware::Next, response::Response};
use permit_hub_common::PermitConfig;
use permit_hub_core::{
    Caller, CatalogService, DocumentRenderer, EvaluatorService, FinaliserService, IntakeService,
    LedgerService, QueryService,
};
use permit_hub_db::repositories::{
    ApprovalLedgerRepository, ApprovalStepRepository, CitizenRepository, FinalDocumentRepository,
    PermitRequestRepository, PermitTypeRepository, RequirementRepository, RoleRepository,
};
use sea_orm::DatabaseConnection;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the role the user acts under.
pub const ROLE_ID_HEADER: &str = "x-role-id";

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub catalog: CatalogService,
    pub intake: IntakeService,
    pub evaluator: EvaluatorService,
    pub query: QueryService,
}

impl AppState {
    /// Wire every engine service over one database pool.
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        renderer: Arc<dyn DocumentRenderer>,
        config: &PermitConfig,
    ) -> Self {
        let permit_type_repo = PermitTypeRepository::new(Arc::clone(&db));
        let step_repo = ApprovalStepRepository::new(Arc::clone(&db));
        let role_repo = RoleRepository::new(Arc::clone(&db));
        let requirement_repo = RequirementRepository::new(Arc::clone(&db));
        let request_repo = PermitRequestRepository::new(Arc::clone(&db));
        let citizen_repo = CitizenRepository::new(Arc::clone(&db));
        let ledger_repo = ApprovalLedgerRepository::new(Arc::clone(&db));
        let document_repo = FinalDocumentRepository::new(db);

        let catalog = CatalogService::new(
            permit_type_repo.clone(),
            step_repo.clone(),
            role_repo.clone(),
            requirement_repo,
            request_repo.clone(),
        );
        let ledger = LedgerService::new(ledger_repo.clone());
        let finaliser = FinaliserService::new(
            permit_type_repo.clone(),
            request_repo.clone(),
            ledger_repo,
            document_repo.clone(),
            renderer,
            config,
        );
        let intake = IntakeService::new(
            permit_type_repo,
            step_repo.clone(),
            citizen_repo.clone(),
            request_repo.clone(),
            config.clone(),
        );
        let evaluator =
            EvaluatorService::new(request_repo.clone(), step_repo, ledger.clone(), finaliser);
        let query = QueryService::new(
            request_repo,
            citizen_repo,
            role_repo,
            document_repo,
            catalog.clone(),
            ledger,
            config.clone(),
        );

        Self {
            catalog,
            intake,
            evaluator,
            query,
        }
    }
}

/// Resolve the caller from gateway headers.
///
/// The engine does not authenticate; it trusts the identity the upstream
/// gateway forwards. Requests without a user id carry no caller.
pub async fn caller_middleware(mut req: Request<Body>, next: Next) -> Response {
    if let Some(caller) = caller_from_headers(req.headers()) {
        tracing::debug!(user_id = %caller.user_id, role_id = ?caller.role_id, "Resolved caller");
        req.extensions_mut().insert(caller);
    }

    next.run(req).await
}

fn caller_from_headers(headers: &HeaderMap) -> Option<Caller> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(ToString::to_string)
    };

    Some(Caller {
        user_id: header(USER_ID_HEADER)?,
        role_id: header(ROLE_ID_HEADER),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_caller_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("u1"));
        headers.insert(ROLE_ID_HEADER, HeaderValue::from_static("head"));

        let caller = caller_from_headers(&headers).unwrap();
        assert_eq!(caller, Caller::new("u1", "head"));
    }

    #[test]
    fn test_caller_without_role() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("u1"));
        headers.insert(ROLE_ID_HEADER, HeaderValue::from_static("  "));

        let caller = caller_from_headers(&headers).unwrap();
        assert_eq!(caller.role_id, None);
    }

    #[test]
    fn test_missing_user_is_anonymous() {
        let mut headers = HeaderMap::new();
        headers.insert(ROLE_ID_HEADER, HeaderValue::from_static("head"));

        assert!(caller_from_headers(&headers).is_none());
    }
}
