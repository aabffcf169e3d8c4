//! Vote endpoints.

use agora_common::AppResult;
use agora_core::services::{
    CastInput, CastView, CreateVoteInput, ListVotesInput, TallyView, UpdateVoteInput, VoteView,
};
use axum::{Json, Router, extract::State, response::IntoResponse, routing::post};
use serde::Deserialize;

use crate::{
    extractors::AuthMember,
    middleware::AppState,
    response::{self, ApiResponse},
};

/// Request naming a single vote.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteIdRequest {
    pub vote_id: String,
}

async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateVoteInput>,
) -> AppResult<ApiResponse<VoteView>> {
    let vote = state.vote_service.create(req).await?;
    Ok(ApiResponse::ok(vote))
}

async fn update(
    State(state): State<AppState>,
    Json(req): Json<UpdateVoteInput>,
) -> AppResult<ApiResponse<VoteView>> {
    let vote = state.vote_service.update(req).await?;
    Ok(ApiResponse::ok(vote))
}

async fn delete(
    State(state): State<AppState>,
    Json(req): Json<VoteIdRequest>,
) -> AppResult<impl IntoResponse> {
    state.vote_service.delete(&req.vote_id).await?;
    Ok(response::ok())
}

async fn show(
    State(state): State<AppState>,
    Json(req): Json<VoteIdRequest>,
) -> AppResult<ApiResponse<VoteView>> {
    let vote = state.vote_service.get(&req.vote_id).await?;
    Ok(ApiResponse::ok(vote))
}

async fn list(
    State(state): State<AppState>,
    Json(req): Json<ListVotesInput>,
) -> AppResult<ApiResponse<Vec<VoteView>>> {
    let votes = state.vote_service.list(req).await?;
    Ok(ApiResponse::ok(votes))
}

async fn start(
    State(state): State<AppState>,
    Json(req): Json<VoteIdRequest>,
) -> AppResult<ApiResponse<VoteView>> {
    let vote = state.vote_service.start(&req.vote_id).await?;
    Ok(ApiResponse::ok(vote))
}

/// End a vote; responds with the frozen tally.
async fn end(
    State(state): State<AppState>,
    Json(req): Json<VoteIdRequest>,
) -> AppResult<ApiResponse<TallyView>> {
    let tally = state.vote_service.end(&req.vote_id).await?;
    Ok(ApiResponse::ok(tally))
}

async fn cast(
    AuthMember(member_id): AuthMember,
    State(state): State<AppState>,
    Json(req): Json<CastInput>,
) -> AppResult<ApiResponse<CastView>> {
    let cast = state
        .vote_service
        .cast_or_update(&member_id, &req.vote_id, &req.choice_id)
        .await?;
    Ok(ApiResponse::ok(cast))
}

async fn my_cast(
    AuthMember(member_id): AuthMember,
    State(state): State<AppState>,
    Json(req): Json<VoteIdRequest>,
) -> AppResult<ApiResponse<Option<CastView>>> {
    let cast = state
        .vote_service
        .get_member_cast(&req.vote_id, &member_id)
        .await?;
    Ok(ApiResponse::ok(cast))
}

async fn tally(
    State(state): State<AppState>,
    Json(req): Json<VoteIdRequest>,
) -> AppResult<ApiResponse<TallyView>> {
    let tally = state.vote_service.get_tally(&req.vote_id).await?;
    Ok(ApiResponse::ok(tally))
}

async fn casts(
    State(state): State<AppState>,
    Json(req): Json<VoteIdRequest>,
) -> AppResult<ApiResponse<Vec<CastView>>> {
    let casts = state.vote_service.list_casts(&req.vote_id).await?;
    Ok(ApiResponse::ok(casts))
}

/// Create the votes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create))
        .route("/update", post(update))
        .route("/delete", post(delete))
        .route("/show", post(show))
        .route("/list", post(list))
        .route("/start", post(start))
        .route("/end", post(end))
        .route("/cast", post(cast))
        .route("/my-cast", post(my_cast))
        .route("/tally", post(tally))
        .route("/casts", post(casts))
}
