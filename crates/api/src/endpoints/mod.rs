//! API endpoints.

mod permit_types;
mod requests;

use axum::{Router, middleware};

use crate::middleware::{AppState, caller_middleware};

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/permit-types", permit_types::router())
        .nest("/requests", requests::router())
        .layer(middleware::from_fn(caller_middleware))
}
