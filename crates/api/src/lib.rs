//! HTTP API layer for permit-hub.
//!
//! A thin axum surface over the permit engine:
//!
//! - **Endpoints**: permit type lookup, request intake, decisions and request administration
//! - **Extractors**: caller identity forwarded by the authenticating gateway
//! - **Middleware**: shared application state
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
pub use middleware::AppState;
