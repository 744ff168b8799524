use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use websocket::hub::PendingObligation;

use crate::error::ApiResult;
use crate::state::AppState;

/// Rooms where the user has an open obligation (their turn, an edit
/// awaiting response, or a resume-ready pending).
pub async fn pending_drafts(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<PendingObligation>>> {
    Ok(Json(state.hub.pending_draft_actions_for_user(user_id).await))
}
