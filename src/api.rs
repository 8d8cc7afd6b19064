//! HTTP action endpoints.
//!
//! Thin adapters over the session store: every handler validates
//! through the store call and maps `GameError` to its JSON body and
//! status via `IntoResponse`. Broadcast side effects happen inside the
//! store, not here.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

use crate::error::GameError;
use crate::protocol::*;
use crate::state::AppState;
use crate::types::Room;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/rooms", post(create_room))
        .route("/api/rooms/{code}", get(room_snapshot))
        .route("/api/rooms/{code}/join", post(join_room))
        .route("/api/rooms/{code}/ready", post(set_ready))
        .route("/api/rooms/{code}/start", post(start_round))
        .route("/api/rooms/{code}/scene", post(generate_scene))
        .route("/api/rooms/{code}/prompt", post(send_gm_prompt))
        .route("/api/rooms/{code}/description", post(send_gm_description))
        .route("/api/rooms/{code}/guess", post(submit_guess))
        .route("/api/rooms/{code}/leave", post(leave_room))
        .route("/api/rooms/{code}/reset", post(reset_room))
        .route("/api/images", post(generate_image))
}

async fn create_room(State(state): State<Arc<AppState>>) -> Json<Room> {
    Json(state.create_room().await)
}

async fn room_snapshot(
    Path(code): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Snapshot>, GameError> {
    Ok(Json(state.snapshot(&code).await?))
}

async fn join_room(
    Path(code): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(req): Json<JoinRequest>,
) -> Result<Json<JoinResponse>, GameError> {
    Ok(Json(
        state.join(&code, &req.player_id, &req.player_name).await?,
    ))
}

async fn set_ready(
    Path(code): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReadyRequest>,
) -> Result<Json<ReadyResponse>, GameError> {
    Ok(Json(
        state.set_ready(&code, &req.player_id, req.is_ready).await?,
    ))
}

async fn start_round(
    Path(code): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartRequest>,
) -> Result<Json<StartResponse>, GameError> {
    Ok(Json(state.start_round(&code, &req.player_id).await?))
}

async fn generate_scene(
    Path(code): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(req): Json<SceneRequest>,
) -> Result<Json<SceneResponse>, GameError> {
    Ok(Json(state.generate_scene(&code, &req.player_id).await?))
}

async fn send_gm_prompt(
    Path(code): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(req): Json<GmPromptRequest>,
) -> Result<Json<Ack>, GameError> {
    state
        .set_gm_scene(&code, &req.player_id, &req.prompt, &req.image_url)
        .await?;
    Ok(Json(Ack::ok()))
}

async fn send_gm_description(
    Path(code): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(req): Json<DescriptionRequest>,
) -> Result<Json<Ack>, GameError> {
    state
        .set_gm_description(&code, &req.player_id, &req.description)
        .await?;
    Ok(Json(Ack::ok()))
}

async fn submit_guess(
    Path(code): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(req): Json<GuessRequest>,
) -> Result<Json<GuessResponse>, GameError> {
    Ok(Json(
        state
            .submit_guess(&code, &req.player_id, &req.player_name, &req.guess)
            .await?,
    ))
}

async fn leave_room(
    Path(code): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(req): Json<LeaveRequest>,
) -> Result<Json<LeaveResponse>, GameError> {
    Ok(Json(state.leave(&code, &req.player_id).await?))
}

async fn reset_room(
    Path(code): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Ack>, GameError> {
    state.reset(&code).await?;
    Ok(Json(Ack::ok()))
}

/// Ad-hoc image generation. Never hard-fails: vendor trouble resolves
/// to the placeholder reference.
async fn generate_image(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateImageRequest>,
) -> Result<Json<GenerateImageResponse>, GameError> {
    if req.prompt.trim().is_empty() {
        return Err(GameError::InvalidInput(
            "prompt must not be empty".to_string(),
        ));
    }
    let image_url = state.images.generate(req.prompt.trim()).await;
    Ok(Json(GenerateImageResponse { image_url }))
}
