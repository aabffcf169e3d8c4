//! API middleware.

#![allow(missing_docs)]

use agora_core::{CommitteeService, VoteService};
use axum::{body::Body, http::Request, middleware::Next, response::Response};

use crate::{MEMBER_ID_HEADER, extractors::CallerMember};

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub vote_service: VoteService,
    pub committee_service: CommitteeService,
}

/// Caller identity middleware.
///
/// Authentication happens upstream; the gateway forwards the member id in
/// the `X-Member-Id` header. A usable value is attached to the request so
/// [`crate::extractors::AuthMember`] can pick it up.
pub async fn member_identity(mut req: Request<Body>, next: Next) -> Response {
    if let Some(value) = req.headers().get(MEMBER_ID_HEADER)
        && let Ok(member_id) = value.to_str()
    {
        let member_id = member_id.trim();
        if !member_id.is_empty() && member_id.len() <= 64 {
            let caller = CallerMember(member_id.to_string());
            req.extensions_mut().insert(caller);
        } else {
            tracing::debug!("Ignoring malformed member id header");
        }
    }

    next.run(req).await
}
