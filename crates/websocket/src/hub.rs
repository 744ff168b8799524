use std::sync::{Arc, Weak};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use domain::collaborators::{
    ChampionCatalog, CreatedRoom, DraftRoomFactory, PersistenceHooks, TeamGenerator, UserDirectory,
};
use domain::errors::{DomainError, DomainResult};
use domain::models::lobby::{Lobby, LobbyConfig};
use domain::models::session::generate_short_code;

use crate::draft_room::{spawn_draft_room, DraftRoomConfig, ObligationKind, RoomHandle, RoomPlayer, RoomRequest};
use crate::lobby_session::{spawn_lobby, LobbyHandle, LobbyRequest};

/// A room where a user has something waiting on them, for notification UX.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingObligation {
    pub room_id: Uuid,
    pub short_code: String,
    pub kind: ObligationKind,
}

/// Process-wide registry of live sessions. The only cross-session mutable
/// tables are the maps below; everything else belongs to a session's loop.
pub struct Hub {
    rooms: DashMap<Uuid, RoomHandle>,
    lobbies: DashMap<Uuid, LobbyHandle>,
    room_codes: DashMap<String, Uuid>,
    lobby_codes: DashMap<String, Uuid>,
    directory: Arc<dyn UserDirectory>,
    catalog: Arc<dyn ChampionCatalog>,
    generator: Arc<dyn TeamGenerator>,
    hooks: Option<Arc<dyn PersistenceHooks>>,
    /// Handed to lobby room factories so they can create rooms back through
    /// this hub without a reference cycle.
    self_ref: Weak<Hub>,
}

impl Hub {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        catalog: Arc<dyn ChampionCatalog>,
        generator: Arc<dyn TeamGenerator>,
        hooks: Option<Arc<dyn PersistenceHooks>>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            rooms: DashMap::new(),
            lobbies: DashMap::new(),
            room_codes: DashMap::new(),
            lobby_codes: DashMap::new(),
            directory,
            catalog,
            generator,
            hooks,
            self_ref: self_ref.clone(),
        })
    }

    /// Register and start a draft room. Duplicate ids are an error.
    pub fn create_draft_room(&self, config: DraftRoomConfig) -> DomainResult<RoomHandle> {
        if self.rooms.contains_key(&config.id) {
            return Err(DomainError::DuplicateSession(config.id.to_string()));
        }
        info!(room_id = %config.id, short_code = %config.short_code, "creating draft room");
        let short_code = config.short_code.clone();
        let handle = spawn_draft_room(
            config,
            Arc::clone(&self.catalog),
            Arc::clone(&self.directory),
            self.hooks.clone(),
        );
        self.room_codes.insert(short_code, handle.id);
        self.rooms.insert(handle.id, handle.clone());
        Ok(handle)
    }

    /// Register and start a lobby. Its draft rooms are created back through
    /// this hub when the start-draft action executes.
    pub fn create_lobby(&self, config: LobbyConfig) -> DomainResult<LobbyHandle> {
        if self.lobbies.contains_key(&config.id) {
            return Err(DomainError::DuplicateSession(config.id.to_string()));
        }
        info!(lobby_id = %config.id, short_code = %config.short_code, "creating lobby");
        let factory: Arc<dyn DraftRoomFactory> = Arc::new(HubRoomFactory {
            hub: self.self_ref.clone(),
        });
        let lobby = Lobby::new(config);
        let short_code = lobby.short_code.clone();
        let handle = spawn_lobby(
            lobby,
            Arc::clone(&self.generator),
            factory,
            Arc::clone(&self.directory),
            self.hooks.clone(),
        );
        self.lobby_codes.insert(short_code, handle.id);
        self.lobbies.insert(handle.id, handle.clone());
        Ok(handle)
    }

    pub fn draft_room(&self, room_id: Uuid) -> DomainResult<RoomHandle> {
        self.rooms
            .get(&room_id)
            .map(|h| h.clone())
            .ok_or_else(|| DomainError::RoomNotFound(room_id.to_string()))
    }

    pub fn draft_room_by_code(&self, short_code: &str) -> DomainResult<RoomHandle> {
        let room_id = self
            .room_codes
            .get(short_code)
            .map(|id| *id)
            .ok_or_else(|| DomainError::RoomNotFound(short_code.to_string()))?;
        self.draft_room(room_id)
    }

    pub fn lobby(&self, lobby_id: Uuid) -> DomainResult<LobbyHandle> {
        self.lobbies
            .get(&lobby_id)
            .map(|h| h.clone())
            .ok_or_else(|| DomainError::LobbyNotFound(lobby_id.to_string()))
    }

    pub fn lobby_by_code(&self, short_code: &str) -> DomainResult<LobbyHandle> {
        let lobby_id = self
            .lobby_codes
            .get(short_code)
            .map(|id| *id)
            .ok_or_else(|| DomainError::LobbyNotFound(short_code.to_string()))?;
        self.lobby(lobby_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn lobby_count(&self) -> usize {
        self.lobbies.len()
    }

    /// Rooms in which the user currently has an open obligation: their turn
    /// to act, an edit awaiting their response, or a resume-ready pending.
    pub async fn pending_draft_actions_for_user(&self, user_id: Uuid) -> Vec<PendingObligation> {
        let handles: Vec<RoomHandle> = self.rooms.iter().map(|e| e.value().clone()).collect();
        let mut obligations = Vec::new();
        for handle in handles {
            if let Some(kind) = handle.pending_for_user(user_id).await {
                obligations.push(PendingObligation {
                    room_id: handle.id,
                    short_code: handle.short_code.clone(),
                    kind,
                });
            }
        }
        obligations
    }

    /// Drain every session; part of process shutdown.
    pub async fn shutdown(&self) {
        info!(
            rooms = self.rooms.len(),
            lobbies = self.lobbies.len(),
            "hub shutting down"
        );
        let rooms: Vec<RoomHandle> = self.rooms.iter().map(|e| e.value().clone()).collect();
        for room in rooms {
            room.request(RoomRequest::Shutdown).await;
        }
        let lobbies: Vec<LobbyHandle> = self.lobbies.iter().map(|e| e.value().clone()).collect();
        for lobby in lobbies {
            lobby.request(LobbyRequest::Shutdown).await;
        }
        self.rooms.clear();
        self.lobbies.clear();
        self.room_codes.clear();
        self.lobby_codes.clear();
    }
}

/// Creates a lobby's draft room inside the owning hub, copying the selected
/// roster across. Holds a weak reference so lobby sessions do not keep the
/// hub alive.
pub struct HubRoomFactory {
    hub: Weak<Hub>,
}

#[async_trait]
impl DraftRoomFactory for HubRoomFactory {
    async fn create(&self, lobby: &Lobby) -> DomainResult<CreatedRoom> {
        let hub = self
            .hub
            .upgrade()
            .ok_or_else(|| DomainError::Internal("hub has shut down".to_string()))?;

        let roster = lobby
            .players
            .iter()
            .map(|p| {
                Ok(RoomPlayer {
                    user_id: p.user_id,
                    display_name: p.display_name.clone(),
                    team: p.team.ok_or_else(|| {
                        DomainError::InvalidState("player has no team".to_string())
                    })?,
                    role: p.role,
                    captain: p.captain,
                })
            })
            .collect::<DomainResult<Vec<_>>>()?;

        let config = DraftRoomConfig {
            id: Uuid::new_v4(),
            short_code: generate_short_code(),
            timer_ms: lobby.timer_secs as u64 * 1_000,
            mode: lobby.draft_mode,
            roster: Some(roster),
            fearless_bans: Vec::new(),
        };
        let handle = hub.create_draft_room(config)?;
        Ok(CreatedRoom {
            room_id: handle.id,
            short_code: handle.short_code.clone(),
        })
    }
}
