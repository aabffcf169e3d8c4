//! Committee roster endpoints.

use agora_common::AppResult;
use agora_core::services::{ListMembersInput, MemberInput, MemberView};
use axum::{Json, Router, extract::State, response::IntoResponse, routing::post};

use crate::{
    middleware::AppState,
    response::{self, ApiResponse},
};

async fn add_member(
    State(state): State<AppState>,
    Json(req): Json<MemberInput>,
) -> AppResult<ApiResponse<MemberView>> {
    let member = state.committee_service.add_member(req).await?;
    Ok(ApiResponse::ok(member))
}

async fn remove_member(
    State(state): State<AppState>,
    Json(req): Json<MemberInput>,
) -> AppResult<impl IntoResponse> {
    state.committee_service.remove_member(req).await?;
    Ok(response::ok())
}

async fn list_members(
    State(state): State<AppState>,
    Json(req): Json<ListMembersInput>,
) -> AppResult<ApiResponse<Vec<MemberView>>> {
    let members = state.committee_service.list_members(req).await?;
    Ok(ApiResponse::ok(members))
}

/// Create the committees router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/members/add", post(add_member))
        .route("/members/remove", post(remove_member))
        .route("/members/list", post(list_members))
}
