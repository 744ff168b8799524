use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use domain::models::draft::DraftMode;
use domain::models::lobby::{LobbyConfig, VotingConfig, VotingMode};
use domain::models::session::generate_short_code;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateLobbyRequest {
    pub creator_user_id: Uuid,
    #[serde(default = "default_mode")]
    pub draft_mode: DraftMode,
    #[serde(default = "default_timer_secs")]
    pub timer_secs: u32,
    #[serde(default)]
    pub voting_enabled: bool,
    #[serde(default = "default_voting_mode")]
    pub voting_mode: VotingMode,
}

fn default_mode() -> DraftMode {
    DraftMode::ProPlay
}

fn default_timer_secs() -> u32 {
    30
}

fn default_voting_mode() -> VotingMode {
    VotingMode::Majority
}

#[derive(Debug, Serialize)]
pub struct CreatedSessionResponse {
    pub id: Uuid,
    pub short_code: String,
}

pub async fn create_lobby(
    State(state): State<AppState>,
    Json(body): Json<CreateLobbyRequest>,
) -> ApiResult<Json<CreatedSessionResponse>> {
    let handle = state.hub.create_lobby(LobbyConfig {
        id: Uuid::new_v4(),
        short_code: generate_short_code(),
        creator_user_id: body.creator_user_id,
        draft_mode: body.draft_mode,
        timer_secs: body.timer_secs,
        voting: VotingConfig {
            enabled: body.voting_enabled,
            mode: body.voting_mode,
            deadline: None,
        },
    })?;
    Ok(Json(CreatedSessionResponse {
        id: handle.id,
        short_code: handle.short_code.clone(),
    }))
}
