use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use domain::collaborators::{DraftRoomFactory, PersistenceHooks, TeamGenerator, UserDirectory};
use domain::errors::{DomainError, DomainResult};
use domain::models::lobby::{Lobby, LobbyStatus};
use domain::models::pending_action::{ActionType, PendingAction};

use crate::emitter::SessionEmitter;
use crate::messages::lobby::{ActionProposal, LobbyServerMessage, LobbySnapshot};

const REQUEST_BUFFER: usize = 64;

/// Cadence of the expired-action sweeper.
const SWEEP_INTERVAL_SECS: u64 = 10;

/// Typed requests consumed by a lobby's event loop.
#[derive(Debug)]
pub enum LobbyRequest {
    Join {
        connection_id: Uuid,
        user_id: Uuid,
        outbound: mpsc::Sender<String>,
        reply: oneshot::Sender<DomainResult<()>>,
    },
    /// Transport-level drop: the connection detaches, the seat stays.
    Disconnect {
        connection_id: Uuid,
    },
    /// Explicit departure: the player's seat is destroyed.
    LeaveLobby {
        connection_id: Uuid,
    },
    SetReady {
        connection_id: Uuid,
        ready: bool,
    },
    ToggleVote {
        connection_id: Uuid,
        option_number: u32,
    },
    EndVoting {
        connection_id: Uuid,
        force_option: Option<u32>,
    },
    TakeCaptain {
        connection_id: Uuid,
    },
    PromoteCaptain {
        connection_id: Uuid,
        target_user_id: Uuid,
    },
    Kick {
        connection_id: Uuid,
        target_user_id: Uuid,
    },
    Propose {
        connection_id: Uuid,
        proposal: ActionProposal,
    },
    Approve {
        connection_id: Uuid,
        action_id: Uuid,
    },
    Cancel {
        connection_id: Uuid,
        action_id: Uuid,
    },
    SyncState {
        connection_id: Uuid,
    },
    Ping {
        connection_id: Uuid,
    },
    SweepExpiredActions,
    Shutdown,
}

/// Cloneable handle to a running lobby's request channel.
#[derive(Clone)]
pub struct LobbyHandle {
    pub id: Uuid,
    pub short_code: String,
    tx: mpsc::Sender<LobbyRequest>,
}

impl LobbyHandle {
    pub async fn join(
        &self,
        connection_id: Uuid,
        user_id: Uuid,
        outbound: mpsc::Sender<String>,
    ) -> DomainResult<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(LobbyRequest::Join {
                connection_id,
                user_id,
                outbound,
                reply,
            })
            .await
            .map_err(|_| DomainError::LobbyNotFound(self.id.to_string()))?;
        rx.await
            .map_err(|_| DomainError::Internal("lobby dropped the admit reply".to_string()))?
    }

    pub async fn request(&self, request: LobbyRequest) {
        if self.tx.send(request).await.is_err() {
            debug!(lobby_id = %self.id, "request sent to a stopped lobby");
        }
    }
}

/// Spawn a lobby's single-writer event loop (plus its action sweeper) and
/// return its handle.
pub fn spawn_lobby(
    lobby: Lobby,
    generator: Arc<dyn TeamGenerator>,
    factory: Arc<dyn DraftRoomFactory>,
    directory: Arc<dyn UserDirectory>,
    hooks: Option<Arc<dyn PersistenceHooks>>,
) -> LobbyHandle {
    let (tx, rx) = mpsc::channel(REQUEST_BUFFER);
    let handle = LobbyHandle {
        id: lobby.id,
        short_code: lobby.short_code.clone(),
        tx: tx.clone(),
    };

    let sweeper = {
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if tx.send(LobbyRequest::SweepExpiredActions).await.is_err() {
                    break;
                }
            }
        })
    };

    let session = LobbySession {
        emitter: SessionEmitter::new(lobby.id),
        connections: HashMap::new(),
        lobby,
        generator,
        factory,
        directory,
        hooks,
        sweeper,
    };
    tokio::spawn(session.run(rx));
    handle
}

struct LobbySession {
    lobby: Lobby,
    emitter: SessionEmitter,
    /// connection id -> user id, for request attribution.
    connections: HashMap<Uuid, Uuid>,
    generator: Arc<dyn TeamGenerator>,
    factory: Arc<dyn DraftRoomFactory>,
    directory: Arc<dyn UserDirectory>,
    hooks: Option<Arc<dyn PersistenceHooks>>,
    sweeper: JoinHandle<()>,
}

impl LobbySession {
    async fn run(mut self, mut rx: mpsc::Receiver<LobbyRequest>) {
        info!(lobby_id = %self.lobby.id, short_code = %self.lobby.short_code, "lobby started");
        while let Some(request) = rx.recv().await {
            if matches!(request, LobbyRequest::Shutdown) {
                break;
            }
            self.handle(request).await;
        }
        self.sweeper.abort();
        self.emitter.close_all();
        info!(lobby_id = %self.lobby.id, "lobby stopped");
    }

    async fn handle(&mut self, request: LobbyRequest) {
        match request {
            LobbyRequest::Join {
                connection_id,
                user_id,
                outbound,
                reply,
            } => self.handle_join(connection_id, user_id, outbound, reply).await,
            LobbyRequest::Disconnect { connection_id } => {
                self.connections.remove(&connection_id);
                self.emitter.detach(connection_id);
            }
            LobbyRequest::LeaveLobby { connection_id } => self.handle_leave(connection_id),
            LobbyRequest::SetReady {
                connection_id,
                ready,
            } => self.handle_set_ready(connection_id, ready),
            LobbyRequest::ToggleVote {
                connection_id,
                option_number,
            } => self.handle_toggle_vote(connection_id, option_number),
            LobbyRequest::EndVoting {
                connection_id,
                force_option,
            } => self.handle_end_voting(connection_id, force_option),
            LobbyRequest::TakeCaptain { connection_id } => self.handle_take_captain(connection_id),
            LobbyRequest::PromoteCaptain {
                connection_id,
                target_user_id,
            } => self.handle_promote(connection_id, target_user_id),
            LobbyRequest::Kick {
                connection_id,
                target_user_id,
            } => self.handle_kick(connection_id, target_user_id),
            LobbyRequest::Propose {
                connection_id,
                proposal,
            } => self.handle_propose(connection_id, proposal).await,
            LobbyRequest::Approve {
                connection_id,
                action_id,
            } => self.handle_approve(connection_id, action_id).await,
            LobbyRequest::Cancel {
                connection_id,
                action_id,
            } => self.handle_cancel(connection_id, action_id),
            LobbyRequest::SyncState { connection_id } => self.sync_one(connection_id),
            LobbyRequest::Ping { connection_id } => {
                self.emitter.send_to(connection_id, &LobbyServerMessage::Pong);
            }
            LobbyRequest::SweepExpiredActions => {
                if let Some(action) = self.lobby.sweep_expired_action(Utc::now()) {
                    info!(lobby_id = %self.lobby.id, action_id = %action.id, "pending action expired");
                    self.emitter.broadcast(&LobbyServerMessage::ActionCancelled {
                        action_id: action.id,
                        cancelled_by: "system".to_string(),
                    });
                }
            }
            LobbyRequest::Shutdown => {}
        }
    }

    // --- membership ---

    async fn handle_join(
        &mut self,
        connection_id: Uuid,
        user_id: Uuid,
        outbound: mpsc::Sender<String>,
        reply: oneshot::Sender<DomainResult<()>>,
    ) {
        let newly_joined = match self.lobby.player(user_id) {
            Some(_) => false, // reconnect
            None => {
                let display_name = self.directory.lookup(user_id).await.display_name;
                match self.lobby.add_player(user_id, display_name) {
                    Ok(_) => true,
                    Err(e) => {
                        let _ = reply.send(Err(e));
                        return;
                    }
                }
            }
        };

        self.emitter.attach(connection_id, user_id, outbound);
        self.connections.insert(connection_id, user_id);
        let _ = reply.send(Ok(()));
        self.sync_one(connection_id);

        if newly_joined {
            let player = self.lobby.player(user_id).expect("just added");
            self.emitter.broadcast(&LobbyServerMessage::PlayerJoined {
                user_id,
                display_name: player.display_name.clone(),
                join_order: player.join_order,
            });
        }
    }

    fn handle_leave(&mut self, connection_id: Uuid) {
        let Some(user_id) = self.connections.get(&connection_id).copied() else {
            self.emitter.detach(connection_id);
            return;
        };
        match self.lobby.remove_player(user_id) {
            Ok(removed) => {
                self.emitter.broadcast(&LobbyServerMessage::PlayerLeft {
                    user_id,
                    new_creator: removed.new_creator,
                });
                if let (Some(new_captain), Some(team)) =
                    (removed.new_captain, removed.player.team)
                {
                    self.emitter.broadcast(&LobbyServerMessage::CaptainChanged {
                        team,
                        user_id: new_captain,
                        previous: Some(user_id),
                    });
                }
            }
            Err(e) => self.reply_err(connection_id, &e),
        }
        self.drop_user_connections(user_id);
    }

    fn handle_set_ready(&mut self, connection_id: Uuid, ready: bool) {
        match self
            .caller(connection_id)
            .and_then(|user| self.lobby.set_ready(user, ready).map(|r| (user, r)))
        {
            Ok((user_id, ready)) => {
                self.emitter
                    .broadcast(&LobbyServerMessage::PlayerReadyChanged { user_id, ready });
            }
            Err(e) => self.reply_err(connection_id, &e),
        }
    }

    // --- voting ---

    fn handle_toggle_vote(&mut self, connection_id: Uuid, option_number: u32) {
        match self
            .caller(connection_id)
            .and_then(|user| self.lobby.toggle_vote(user, option_number).map(|a| (user, a)))
        {
            Ok((user_id, active)) => {
                self.emitter.broadcast(&LobbyServerMessage::VoteCast {
                    user_id,
                    option_number,
                    active,
                });
                self.broadcast_voting_status();
            }
            Err(e) => self.reply_err(connection_id, &e),
        }
    }

    fn handle_end_voting(&mut self, connection_id: Uuid, force_option: Option<u32>) {
        let result = self
            .caller(connection_id)
            .and_then(|user| self.require_selection_authority(user))
            .and_then(|_| self.lobby.end_voting(force_option));
        match result {
            Ok(option_number) => self.run_select_option(connection_id, option_number),
            Err(e) => self.reply_err(connection_id, &e),
        }
    }

    // --- captaincy and moderation ---

    fn handle_take_captain(&mut self, connection_id: Uuid) {
        match self
            .caller(connection_id)
            .and_then(|user| self.lobby.take_captain(user))
        {
            Ok(change) => {
                self.emitter.broadcast(&LobbyServerMessage::CaptainChanged {
                    team: change.team,
                    user_id: change.user_id,
                    previous: change.previous,
                });
            }
            Err(e) => self.reply_err(connection_id, &e),
        }
    }

    fn handle_promote(&mut self, connection_id: Uuid, target_user_id: Uuid) {
        match self
            .caller(connection_id)
            .and_then(|user| self.lobby.promote_captain(user, target_user_id))
        {
            Ok(change) => {
                self.emitter.broadcast(&LobbyServerMessage::CaptainChanged {
                    team: change.team,
                    user_id: change.user_id,
                    previous: change.previous,
                });
            }
            Err(e) => self.reply_err(connection_id, &e),
        }
    }

    fn handle_kick(&mut self, connection_id: Uuid, target_user_id: Uuid) {
        match self
            .caller(connection_id)
            .and_then(|user| self.lobby.kick(user, target_user_id).map(|r| (user, r)))
        {
            Ok((kicked_by, removed)) => {
                self.emitter.broadcast(&LobbyServerMessage::PlayerKicked {
                    user_id: target_user_id,
                    kicked_by,
                });
                if let Some(new_creator) = removed.new_creator {
                    self.emitter.broadcast(&LobbyServerMessage::PlayerLeft {
                        user_id: target_user_id,
                        new_creator: Some(new_creator),
                    });
                }
                if let (Some(new_captain), Some(team)) =
                    (removed.new_captain, removed.player.team)
                {
                    self.emitter.broadcast(&LobbyServerMessage::CaptainChanged {
                        team,
                        user_id: new_captain,
                        previous: Some(target_user_id),
                    });
                }
                self.drop_user_connections(target_user_id);
            }
            Err(e) => self.reply_err(connection_id, &e),
        }
    }

    // --- joint actions ---

    async fn handle_propose(&mut self, connection_id: Uuid, proposal: ActionProposal) {
        let caller = match self.caller(connection_id) {
            Ok(user) => user,
            Err(e) => return self.reply_err(connection_id, &e),
        };

        // Until a first team assignment exists there are no captains, so the
        // bootstrap decisions execute without cross-team approval.
        if !self.lobby.has_captains() {
            match proposal.action_type {
                ActionType::Matchmake => {
                    if self.lobby.player(caller).is_none() {
                        return self.reply_err(connection_id, &DomainError::Unauthorized);
                    }
                    self.run_matchmake(connection_id).await;
                    return;
                }
                ActionType::SelectOption => {
                    if caller != self.lobby.creator_user_id {
                        return self.reply_err(connection_id, &DomainError::Unauthorized);
                    }
                    let Some(option_number) = proposal.option_number else {
                        return self.reply_err(
                            connection_id,
                            &DomainError::InvalidPayload("option number is required".to_string()),
                        );
                    };
                    self.run_select_option(connection_id, option_number);
                    return;
                }
                _ => {
                    return self.reply_err(
                        connection_id,
                        &DomainError::InvalidState("teams have not been formed yet".to_string()),
                    )
                }
            }
        }

        match self.lobby.propose_action(
            caller,
            proposal.action_type,
            proposal.target_player_ids,
            proposal.option_number,
        ) {
            Ok(action) => {
                self.emitter
                    .broadcast(&LobbyServerMessage::ActionProposed { action });
            }
            Err(e) => self.reply_err(connection_id, &e),
        }
    }

    async fn handle_approve(&mut self, connection_id: Uuid, action_id: Uuid) {
        let result = self
            .caller(connection_id)
            .and_then(|user| {
                let side = self
                    .lobby
                    .side_of(user)
                    .ok_or(DomainError::Unauthorized)?;
                Ok((user, side))
            })
            .and_then(|(user, side)| {
                self.lobby.approve_action(user, action_id).map(|a| (side, a))
            });
        match result {
            Ok((side, outcome)) => {
                self.emitter
                    .broadcast(&LobbyServerMessage::ActionApproved { action_id, side });
                if let Some(action) = outcome {
                    self.execute_action(connection_id, action).await;
                }
            }
            Err(e) => self.reply_err(connection_id, &e),
        }
    }

    fn handle_cancel(&mut self, connection_id: Uuid, action_id: Uuid) {
        match self
            .caller(connection_id)
            .and_then(|user| self.lobby.cancel_action(user, action_id).map(|a| (user, a)))
        {
            Ok((user, action)) => {
                self.emitter.broadcast(&LobbyServerMessage::ActionCancelled {
                    action_id: action.id,
                    cancelled_by: user.to_string(),
                });
            }
            Err(e) => self.reply_err(connection_id, &e),
        }
    }

    /// Run an approved action's execute hook. A failed execution cancels the
    /// action so the lobby is not wedged behind it.
    async fn execute_action(&mut self, connection_id: Uuid, action: PendingAction) {
        let result = match action.action {
            ActionType::Matchmake => self.try_matchmake().await,
            ActionType::SelectOption => action
                .option_number
                .ok_or_else(|| DomainError::InvalidPayload("option number missing".to_string()))
                .and_then(|n| self.try_select_option(n)),
            ActionType::SwapPlayers => self
                .lobby
                .swap_players(action.target_player_ids[0], action.target_player_ids[1])
                .and_then(|()| {
                    self.broadcast_team_update();
                    Ok(())
                }),
            ActionType::SwapRoles => self
                .lobby
                .swap_roles(action.target_player_ids[0], action.target_player_ids[1])
                .and_then(|()| {
                    self.broadcast_team_update();
                    Ok(())
                }),
            ActionType::StartDraft => self.try_start_draft().await,
            ActionType::PromoteCaptain | ActionType::Kick => {
                Err(DomainError::InvalidState("action is not arbitered".to_string()))
            }
        };

        match result {
            Ok(()) => {
                if let Ok(executed) = self.lobby.mark_action_executed(action.id) {
                    self.emitter
                        .broadcast(&LobbyServerMessage::ActionExecuted { action: executed });
                }
            }
            Err(e) => {
                warn!(lobby_id = %self.lobby.id, action_id = %action.id, error = %e, "action execution failed");
                self.reply_err(connection_id, &e);
                if self.lobby.pending_action.as_ref().map(|a| a.id) == Some(action.id) {
                    self.lobby.pending_action = None;
                }
                self.emitter.broadcast(&LobbyServerMessage::ActionCancelled {
                    action_id: action.id,
                    cancelled_by: "system".to_string(),
                });
            }
        }
    }

    // --- execute hooks ---

    async fn run_matchmake(&mut self, connection_id: Uuid) {
        if let Err(e) = self.try_matchmake().await {
            self.reply_err(connection_id, &e);
        }
    }

    async fn try_matchmake(&mut self) -> DomainResult<()> {
        self.lobby.ensure_can_matchmake()?;
        let options = self
            .generator
            .generate(&self.lobby.players, self.lobby.draft_mode)
            .await
            .map_err(|e| {
                warn!(lobby_id = %self.lobby.id, error = %e, "team generation failed");
                DomainError::Internal("team generation failed".to_string())
            })?;
        if options.is_empty() {
            return Err(DomainError::Internal(
                "team generator returned no options".to_string(),
            ));
        }

        self.lobby.begin_matchmaking(options.clone());
        self.emitter.broadcast(&LobbyServerMessage::StatusChanged {
            status: LobbyStatus::Matchmaking,
        });
        self.emitter
            .broadcast(&LobbyServerMessage::MatchOptionsGenerated {
                options: options.clone(),
            });
        self.broadcast_voting_status();

        if let Some(hooks) = self.hooks.clone() {
            let lobby_id = self.lobby.id;
            tokio::spawn(async move {
                hooks.on_match_options_generated(lobby_id, &options).await;
            });
        }
        Ok(())
    }

    fn run_select_option(&mut self, connection_id: Uuid, option_number: u32) {
        if let Err(e) = self.try_select_option(option_number) {
            self.reply_err(connection_id, &e);
        }
    }

    fn try_select_option(&mut self, option_number: u32) -> DomainResult<()> {
        let stats = self.lobby.apply_option(option_number)?;
        info!(lobby_id = %self.lobby.id, option_number, "team option selected");
        self.emitter.broadcast(&LobbyServerMessage::TeamSelected {
            option_number,
            players: self.lobby.players.clone(),
            stats: stats.clone(),
        });
        self.emitter.broadcast(&LobbyServerMessage::StatusChanged {
            status: LobbyStatus::TeamSelected,
        });
        self.emitter
            .broadcast(&LobbyServerMessage::TeamStatsUpdated { stats });
        self.broadcast_voting_status();
        Ok(())
    }

    async fn try_start_draft(&mut self) -> DomainResult<()> {
        if self.lobby.status != LobbyStatus::TeamSelected {
            return Err(DomainError::InvalidState(
                "teams have not been selected".to_string(),
            ));
        }
        let created = self.factory.create(&self.lobby).await.map_err(|e| {
            warn!(lobby_id = %self.lobby.id, error = %e, "draft room creation failed");
            DomainError::Internal("draft room creation failed".to_string())
        })?;
        self.lobby
            .attach_room(created.room_id, created.short_code.clone());
        info!(lobby_id = %self.lobby.id, room_id = %created.room_id, "draft starting");
        self.emitter.broadcast(&LobbyServerMessage::StatusChanged {
            status: LobbyStatus::Drafting,
        });
        self.emitter.broadcast(&LobbyServerMessage::DraftStarting {
            room_id: created.room_id,
            short_code: created.short_code,
        });
        Ok(())
    }

    // --- helpers ---

    fn caller(&self, connection_id: Uuid) -> DomainResult<Uuid> {
        self.connections
            .get(&connection_id)
            .copied()
            .ok_or(DomainError::Unauthorized)
    }

    /// Captains finalize selections; before captains exist, the creator may.
    fn require_selection_authority(&self, user_id: Uuid) -> DomainResult<()> {
        if self.lobby.is_captain(user_id)
            || (!self.lobby.has_captains() && user_id == self.lobby.creator_user_id)
        {
            Ok(())
        } else {
            Err(DomainError::Unauthorized)
        }
    }

    fn broadcast_team_update(&self) {
        if let Ok(stats) = self.lobby.team_stats() {
            self.emitter
                .broadcast(&LobbyServerMessage::TeamStatsUpdated { stats });
        }
    }

    fn broadcast_voting_status(&self) {
        self.emitter
            .broadcast(&LobbyServerMessage::VotingStatusUpdated {
                status: self.lobby.voting_status(),
            });
    }

    fn drop_user_connections(&mut self, user_id: Uuid) {
        let connections: Vec<Uuid> = self
            .connections
            .iter()
            .filter(|(_, u)| **u == user_id)
            .map(|(c, _)| *c)
            .collect();
        for connection_id in connections {
            self.connections.remove(&connection_id);
            self.emitter.detach(connection_id);
        }
    }

    fn reply_err(&self, connection_id: Uuid, err: &DomainError) {
        debug!(lobby_id = %self.lobby.id, code = err.code(), "rejecting lobby command");
        self.emitter
            .send_to(connection_id, &LobbyServerMessage::error(err.code(), err.to_string()));
    }

    fn sync_one(&self, connection_id: Uuid) {
        let snapshot = self.snapshot();
        self.emitter.send_to(
            connection_id,
            &LobbyServerMessage::LobbyStateSync {
                payload: Box::new(snapshot),
            },
        );
    }

    fn snapshot(&self) -> LobbySnapshot {
        LobbySnapshot {
            lobby_id: self.lobby.id,
            short_code: self.lobby.short_code.clone(),
            creator_user_id: self.lobby.creator_user_id,
            status: self.lobby.status,
            draft_mode: self.lobby.draft_mode,
            timer_secs: self.lobby.timer_secs,
            room_id: self.lobby.room_id,
            room_short_code: self.lobby.room_short_code.clone(),
            selected_match_option: self.lobby.selected_match_option,
            players: self.lobby.players.clone(),
            options: self.lobby.options.clone(),
            votes: self.lobby.votes.clone(),
            pending_action: self.lobby.pending_action.clone(),
            voting: self.lobby.voting_status(),
        }
    }
}
