use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::DomainResult;
use crate::models::draft::{DraftMode, DraftResult};
use crate::models::lobby::Lobby;
use crate::models::match_option::MatchOption;
use crate::models::player::LobbyPlayer;

/// Display name used when a user id cannot be resolved.
pub const UNKNOWN_DISPLAY_NAME: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub display_name: String,
}

/// Maps a bearer token to a user id. Implementations live outside the core;
/// a failed verification aborts the WebSocket upgrade with 401.
#[async_trait]
pub trait AuthVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> DomainResult<Uuid>;
}

/// Read-only user lookup for event payloads. A missing id yields the
/// [`UNKNOWN_DISPLAY_NAME`] sentinel rather than an error.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn lookup(&self, user_id: Uuid) -> UserProfile;
}

/// Champion universe used for timed-out auto-picks.
pub trait ChampionCatalog: Send + Sync {
    fn list(&self) -> Vec<String>;
}

/// Produces candidate team compositions; the balancing algorithm itself is
/// out of scope for the coordination core.
#[async_trait]
pub trait TeamGenerator: Send + Sync {
    async fn generate(
        &self,
        players: &[LobbyPlayer],
        mode: DraftMode,
    ) -> DomainResult<Vec<MatchOption>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedRoom {
    pub room_id: Uuid,
    pub short_code: String,
}

/// Creates (and externally persists) the draft room a lobby transitions
/// into, returning the identifiers broadcast in `draft_starting`.
#[async_trait]
pub trait DraftRoomFactory: Send + Sync {
    async fn create(&self, lobby: &Lobby) -> DomainResult<CreatedRoom>;
}

/// Best-effort durability callbacks. Failures are logged by implementations
/// and never surface to sessions.
#[async_trait]
pub trait PersistenceHooks: Send + Sync {
    async fn on_draft_completed(&self, room_id: Uuid, result: &DraftResult);
    async fn on_match_options_generated(&self, lobby_id: Uuid, options: &[MatchOption]);
}
