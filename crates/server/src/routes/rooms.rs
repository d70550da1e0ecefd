use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::{
    error::{AppError, Result},
    services::rooms::RoomSummary,
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/:room_id", get(get_room))
}

async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomSummary>> {
    state
        .rooms
        .summary(&room_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Room {room_id} not found")))
}
