use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use domain::models::draft::DraftMode;
use domain::models::session::generate_short_code;
use websocket::draft_room::DraftRoomConfig;

use crate::error::ApiResult;
use crate::handlers::lobbies::CreatedSessionResponse;
use crate::state::AppState;

/// Creates a standalone 1v1 draft room. Team rooms are created by their
/// lobby through the start-draft action.
#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    #[serde(default = "default_timer_secs")]
    pub timer_secs: u32,
    #[serde(default = "default_mode")]
    pub draft_mode: DraftMode,
    #[serde(default)]
    pub fearless_bans: Vec<String>,
}

fn default_timer_secs() -> u32 {
    30
}

fn default_mode() -> DraftMode {
    DraftMode::ProPlay
}

pub async fn create_room(
    State(state): State<AppState>,
    Json(body): Json<CreateRoomRequest>,
) -> ApiResult<Json<CreatedSessionResponse>> {
    let handle = state.hub.create_draft_room(DraftRoomConfig {
        id: Uuid::new_v4(),
        short_code: generate_short_code(),
        timer_ms: body.timer_secs as u64 * 1_000,
        mode: body.draft_mode,
        roster: None,
        fearless_bans: body.fearless_bans,
    })?;
    Ok(Json(CreatedSessionResponse {
        id: handle.id,
        short_code: handle.short_code.clone(),
    }))
}
