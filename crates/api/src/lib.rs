//! HTTP API layer for agora.
//!
//! JSON-over-HTTP transport for the voting engine:
//!
//! - **Endpoints**: votes, casts, tallies and committee rosters
//! - **Extractors**: the calling member, forwarded by the host gateway
//! - **Middleware**: application state and caller identity
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

use axum::{Router, routing::get};

pub use endpoints::router;
pub use middleware::AppState;

/// Header carrying the authenticated member id.
pub const MEMBER_ID_HEADER: &str = "x-member-id";

/// Build the complete application router: `/api/...` plus `/healthz`.
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api", router())
        .route("/healthz", get(endpoints::health))
        .layer(axum::middleware::from_fn(middleware::member_identity))
        .with_state(state)
}
