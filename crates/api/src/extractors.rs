//! Request extractors.

use axum::{extract::FromRequestParts, http::request::Parts};
use permit_hub_common::AppError;
use permit_hub_core::Caller;

use crate::middleware::USER_ID_HEADER;

/// Caller identity resolved by [`crate::middleware::caller_middleware`].
///
/// A missing role is passed through so the evaluator can refuse the
/// decision itself.
#[derive(Debug, Clone)]
pub struct AuthCaller(pub Caller);

impl<S> FromRequestParts<S> for AuthCaller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Caller>()
            .cloned()
            .map(AuthCaller)
            .ok_or_else(|| AppError::Unauthorized(format!("Missing {USER_ID_HEADER} header")))
    }
}
