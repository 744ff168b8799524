use std::collections::HashMap;
use std::sync::Arc;

use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use domain::collaborators::{ChampionCatalog, PersistenceHooks, UserDirectory};
use domain::errors::{DomainError, DomainResult};
use domain::models::draft::{DraftMode, DraftState, Side, NO_CHAMPION};
use domain::models::pending_edit::EditSlot;
use domain::models::player::Role;
use domain::services::timer::{PhaseTimer, TimerSink};

use crate::edit_manager::EditManager;
use crate::emitter::SessionEmitter;
use crate::messages::draft::{
    DraftEvent, DraftServerFrame, DraftSnapshot, RoomPlayerView, RoomStatus, SeatOccupancy,
    SeatSide, TimerTick,
};
use crate::pause_manager::{PauseManager, ResumeReadyOutcome};

/// Requests queued per room before senders start awaiting.
const REQUEST_BUFFER: usize = 64;

/// One roster seat of a team-mode room, copied from the lobby at creation.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomPlayer {
    pub user_id: Uuid,
    pub display_name: String,
    pub team: Side,
    pub role: Option<Role>,
    pub captain: bool,
}

#[derive(Debug, Clone)]
pub struct DraftRoomConfig {
    pub id: Uuid,
    pub short_code: String,
    pub timer_ms: u64,
    pub mode: DraftMode,
    /// Ten-player roster for team drafts; `None` selects 1v1 mode.
    pub roster: Option<Vec<RoomPlayer>>,
    /// Bans carried over from earlier games of a fearless series.
    pub fearless_bans: Vec<String>,
}

/// An open obligation a user has in some room, surfaced for notification UX.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObligationKind {
    YourTurn,
    EditAwaitingResponse,
    ResumeReadyPending,
}

/// The typed requests a draft room's event loop consumes. Client commands
/// arrive through the hub's read loops; the remaining variants are synthetic
/// requests enqueued by timer/countdown/expiry tasks.
#[derive(Debug)]
pub enum RoomRequest {
    Join {
        connection_id: Uuid,
        user_id: Uuid,
        requested_side: Option<Side>,
        outbound: mpsc::Sender<String>,
        reply: oneshot::Sender<DomainResult<SeatSide>>,
    },
    Leave {
        connection_id: Uuid,
    },
    SetReady {
        connection_id: Uuid,
        ready: bool,
    },
    StartDraft {
        connection_id: Uuid,
    },
    Hover {
        connection_id: Uuid,
        champion_id: Option<String>,
    },
    Select {
        connection_id: Uuid,
        champion_id: String,
    },
    LockIn {
        connection_id: Uuid,
    },
    Pause {
        connection_id: Uuid,
    },
    ResumeReady {
        connection_id: Uuid,
        ready: bool,
    },
    ProposeEdit {
        connection_id: Uuid,
        slot: EditSlot,
        champion_id: String,
    },
    RespondEdit {
        connection_id: Uuid,
        accept: bool,
    },
    SyncState {
        connection_id: Uuid,
    },
    TimerExpired {
        generation: u64,
    },
    PauseDeadline {
        pause_generation: u64,
    },
    ResumeCountdownTick {
        pause_generation: u64,
        seconds: u8,
    },
    ResumeCountdownComplete {
        pause_generation: u64,
    },
    EditExpired {
        edit_id: Uuid,
    },
    PendingForUser {
        user_id: Uuid,
        reply: oneshot::Sender<Option<ObligationKind>>,
    },
    Shutdown,
}

/// Cloneable handle to a running draft room's request channel.
#[derive(Clone)]
pub struct RoomHandle {
    pub id: Uuid,
    pub short_code: String,
    tx: mpsc::Sender<RoomRequest>,
}

impl RoomHandle {
    /// Admit a connection. On success the loop has already queued the state
    /// snapshot for the new client.
    pub async fn join(
        &self,
        connection_id: Uuid,
        user_id: Uuid,
        requested_side: Option<Side>,
        outbound: mpsc::Sender<String>,
    ) -> DomainResult<SeatSide> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RoomRequest::Join {
                connection_id,
                user_id,
                requested_side,
                outbound,
                reply,
            })
            .await
            .map_err(|_| DomainError::RoomNotFound(self.id.to_string()))?;
        rx.await
            .map_err(|_| DomainError::Internal("draft room dropped the admit reply".to_string()))?
    }

    /// Enqueue a request, preserving the caller's arrival order.
    pub async fn request(&self, request: RoomRequest) {
        if self.tx.send(request).await.is_err() {
            debug!(room_id = %self.id, "request sent to a stopped draft room");
        }
    }

    pub async fn pending_for_user(&self, user_id: Uuid) -> Option<ObligationKind> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RoomRequest::PendingForUser { user_id, reply })
            .await
            .ok()?;
        rx.await.ok().flatten()
    }
}

/// Spawn a draft room's single-writer event loop and return its handle.
pub fn spawn_draft_room(
    config: DraftRoomConfig,
    catalog: Arc<dyn ChampionCatalog>,
    directory: Arc<dyn UserDirectory>,
    hooks: Option<Arc<dyn PersistenceHooks>>,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(REQUEST_BUFFER);
    let emitter = SessionEmitter::new(config.id);
    let timer = PhaseTimer::new(Arc::new(RoomTimerSink {
        emitter: emitter.clone(),
        requests: tx.clone(),
    }));

    let handle = RoomHandle {
        id: config.id,
        short_code: config.short_code.clone(),
        tx: tx.clone(),
    };

    let room = DraftRoom {
        state: DraftState::new(config.mode, config.fearless_bans.clone()),
        seats: HashMap::new(),
        occupancy: SeatOccupancy::default(),
        pause: PauseManager::new(tx.clone()),
        edits: EditManager::new(tx),
        emitter,
        timer,
        catalog,
        directory,
        hooks,
        config,
    };
    tokio::spawn(room.run(rx));
    handle
}

/// Delivers timer output back into the room: ticks fan out directly (they
/// mutate nothing), expiry is serialized through the request channel.
struct RoomTimerSink {
    emitter: SessionEmitter,
    requests: mpsc::Sender<RoomRequest>,
}

impl TimerSink for RoomTimerSink {
    fn on_tick(&self, remaining_ms: u64, in_buffer: bool) {
        self.emitter.broadcast(&DraftServerFrame::timer(TimerTick {
            remaining_ms,
            in_buffer,
        }));
    }

    fn on_expired(&self, generation: u64) {
        if self
            .requests
            .try_send(RoomRequest::TimerExpired { generation })
            .is_err()
        {
            warn!("failed to enqueue timer expiry");
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Seat {
    user_id: Uuid,
    side: SeatSide,
}

struct DraftRoom {
    config: DraftRoomConfig,
    state: DraftState,
    seats: HashMap<Uuid, Seat>,
    occupancy: SeatOccupancy,
    pause: PauseManager,
    edits: EditManager,
    emitter: SessionEmitter,
    timer: PhaseTimer,
    catalog: Arc<dyn ChampionCatalog>,
    directory: Arc<dyn UserDirectory>,
    hooks: Option<Arc<dyn PersistenceHooks>>,
}

impl DraftRoom {
    async fn run(mut self, mut rx: mpsc::Receiver<RoomRequest>) {
        info!(room_id = %self.config.id, short_code = %self.config.short_code, "draft room started");
        while let Some(request) = rx.recv().await {
            if matches!(request, RoomRequest::Shutdown) {
                break;
            }
            self.handle(request).await;
        }
        self.timer.stop();
        self.emitter.close_all();
        info!(room_id = %self.config.id, "draft room stopped");
    }

    async fn handle(&mut self, request: RoomRequest) {
        match request {
            RoomRequest::Join {
                connection_id,
                user_id,
                requested_side,
                outbound,
                reply,
            } => {
                self.handle_join(connection_id, user_id, requested_side, outbound, reply)
                    .await;
            }
            RoomRequest::Leave { connection_id } => self.handle_leave(connection_id),
            RoomRequest::SetReady {
                connection_id,
                ready,
            } => self.handle_set_ready(connection_id, ready),
            RoomRequest::StartDraft { connection_id } => self.handle_start(connection_id),
            RoomRequest::Hover {
                connection_id,
                champion_id,
            } => self.handle_hover(connection_id, champion_id),
            RoomRequest::Select {
                connection_id,
                champion_id,
            } => self.handle_select(connection_id, champion_id),
            RoomRequest::LockIn { connection_id } => self.handle_lock_in(connection_id),
            RoomRequest::Pause { connection_id } => self.handle_pause(connection_id),
            RoomRequest::ResumeReady {
                connection_id,
                ready,
            } => self.handle_resume_ready(connection_id, ready),
            RoomRequest::ProposeEdit {
                connection_id,
                slot,
                champion_id,
            } => self.handle_propose_edit(connection_id, slot, champion_id),
            RoomRequest::RespondEdit {
                connection_id,
                accept,
            } => self.handle_respond_edit(connection_id, accept),
            RoomRequest::SyncState { connection_id } => self.sync_one(connection_id),
            RoomRequest::TimerExpired { generation } => self.handle_timer_expired(generation),
            RoomRequest::PauseDeadline { pause_generation } => {
                if self.pause.is_current(pause_generation) {
                    self.do_resume("system timeout");
                }
            }
            RoomRequest::ResumeCountdownTick {
                pause_generation,
                seconds,
            } => {
                if self.pause.is_current(pause_generation) {
                    self.pause.note_countdown_tick(seconds);
                    self.broadcast_event(DraftEvent::ResumeCountdown {
                        seconds,
                        cancelled_by: None,
                    });
                }
            }
            RoomRequest::ResumeCountdownComplete { pause_generation } => {
                if self.pause.is_current(pause_generation) {
                    self.do_resume("both players ready");
                }
            }
            RoomRequest::EditExpired { edit_id } => {
                if self.edits.expire(edit_id).is_some() {
                    self.broadcast_event(DraftEvent::EditRejected {
                        reason: "timeout".to_string(),
                    });
                }
            }
            RoomRequest::PendingForUser { user_id, reply } => {
                let _ = reply.send(self.obligation_for(user_id));
            }
            RoomRequest::Shutdown => {}
        }
    }

    // --- admission and presence ---

    async fn handle_join(
        &mut self,
        connection_id: Uuid,
        user_id: Uuid,
        requested_side: Option<Side>,
        outbound: mpsc::Sender<String>,
        reply: oneshot::Sender<DomainResult<SeatSide>>,
    ) {
        let (seat_side, side_taken) = self.resolve_seat(user_id, requested_side);
        self.emitter.attach(connection_id, user_id, outbound);
        self.seats.insert(
            connection_id,
            Seat {
                user_id,
                side: seat_side,
            },
        );
        let _ = reply.send(Ok(seat_side));

        // The snapshot is sequenced before any event this admit triggers.
        self.sync_one(connection_id);
        if side_taken {
            let err = DomainError::SideTaken;
            self.emitter.send_to(
                connection_id,
                &DraftServerFrame::err(err.code(), err.to_string()),
            );
        }

        let display_name = self.display_name(user_id).await;
        self.broadcast_event(DraftEvent::PlayerJoined {
            user_id,
            display_name,
            side: seat_side,
        });
    }

    fn resolve_seat(&mut self, user_id: Uuid, requested: Option<Side>) -> (SeatSide, bool) {
        if let Some(roster) = &self.config.roster {
            // Team mode: the roster is authoritative, the request advisory.
            return match roster.iter().find(|p| p.user_id == user_id) {
                Some(player) => (SeatSide::from(player.team), false),
                None => (SeatSide::Spectator, false),
            };
        }

        // 1v1 mode: reconnects keep their claim.
        if self.occupancy.blue == Some(user_id) {
            return (SeatSide::Blue, false);
        }
        if self.occupancy.red == Some(user_id) {
            return (SeatSide::Red, false);
        }
        let claim = |slot: &mut Option<Uuid>, side: SeatSide| {
            *slot = Some(user_id);
            (side, false)
        };
        match requested {
            Some(Side::Blue) => {
                if self.occupancy.blue.is_none() {
                    claim(&mut self.occupancy.blue, SeatSide::Blue)
                } else {
                    (SeatSide::Spectator, true)
                }
            }
            Some(Side::Red) => {
                if self.occupancy.red.is_none() {
                    claim(&mut self.occupancy.red, SeatSide::Red)
                } else {
                    (SeatSide::Spectator, true)
                }
            }
            None => {
                if self.occupancy.blue.is_none() {
                    claim(&mut self.occupancy.blue, SeatSide::Blue)
                } else if self.occupancy.red.is_none() {
                    claim(&mut self.occupancy.red, SeatSide::Red)
                } else {
                    (SeatSide::Spectator, false)
                }
            }
        }
    }

    fn handle_leave(&mut self, connection_id: Uuid) {
        let Some(seat) = self.seats.remove(&connection_id) else {
            self.emitter.detach(connection_id);
            return;
        };
        self.emitter.detach(connection_id);

        // Before the draft starts, a fully disconnected 1v1 player frees
        // their seat and loses their ready flag.
        if self.config.roster.is_none() && !self.state.started {
            let still_connected = self.seats.values().any(|s| s.user_id == seat.user_id);
            if !still_connected {
                for side in [Side::Blue, Side::Red] {
                    let slot = match side {
                        Side::Blue => &mut self.occupancy.blue,
                        Side::Red => &mut self.occupancy.red,
                    };
                    if *slot == Some(seat.user_id) {
                        *slot = None;
                        if self.state.ready(side) {
                            self.state.set_ready(side, false);
                            self.broadcast_event(DraftEvent::ReadyChanged { side, ready: false });
                        }
                    }
                }
            }
        }

        self.broadcast_event(DraftEvent::PlayerLeft {
            user_id: seat.user_id,
            side: seat.side,
        });
    }

    // --- pre-start ---

    fn handle_set_ready(&mut self, connection_id: Uuid, ready: bool) {
        let result = self.seated_side(connection_id).and_then(|(_, side)| {
            if self.state.started {
                return Err(DomainError::AlreadyStarted);
            }
            Ok(side)
        });
        match result {
            Ok(side) => {
                self.state.set_ready(side, ready);
                self.broadcast_event(DraftEvent::ReadyChanged { side, ready });
            }
            Err(e) => self.reply_err(connection_id, &e),
        }
    }

    fn handle_start(&mut self, connection_id: Uuid) {
        let result = self.seated_side(connection_id).and_then(|_| {
            if self.state.started {
                return Err(DomainError::AlreadyStarted);
            }
            if !self.side_connected(Side::Blue) || !self.side_connected(Side::Red) {
                return Err(DomainError::MissingPlayers);
            }
            Ok(())
        });
        let result = result.and_then(|()| self.state.start());
        match result {
            Ok(()) => {
                info!(room_id = %self.config.id, "draft started");
                self.broadcast_event(DraftEvent::DraftStarted);
                self.sync_all();
                let phase = self.state.current_phase().expect("fresh draft has phases");
                self.broadcast_event(DraftEvent::PhaseChanged {
                    phase_index: 0,
                    team: phase.team,
                    action: phase.action,
                    timer_ms: self.config.timer_ms,
                });
                self.timer.start(self.config.timer_ms);
            }
            Err(e) => self.reply_err(connection_id, &e),
        }
    }

    // --- in-draft actions ---

    fn handle_hover(&mut self, connection_id: Uuid, champion_id: Option<String>) {
        match self.acting_context(connection_id) {
            Ok((_, side)) => {
                // Pure preview: no availability validation.
                self.state.set_hover(side, champion_id.clone());
                self.broadcast_event(DraftEvent::ChampionHovered { side, champion_id });
            }
            Err(e) => self.reply_err(connection_id, &e),
        }
    }

    fn handle_select(&mut self, connection_id: Uuid, champion_id: String) {
        let result = self
            .acting_context(connection_id)
            .and_then(|(_, side)| {
                self.state.validate_available(&champion_id)?;
                Ok(side)
            });
        match result {
            Ok(side) => {
                self.state.set_hover(side, Some(champion_id.clone()));
                self.broadcast_event(DraftEvent::ChampionHovered {
                    side,
                    champion_id: Some(champion_id),
                });
            }
            Err(e) => self.reply_err(connection_id, &e),
        }
    }

    fn handle_lock_in(&mut self, connection_id: Uuid) {
        let result = self.acting_context(connection_id).and_then(|(_, side)| {
            let champion = self
                .state
                .hover(side)
                .unwrap_or(NO_CHAMPION)
                .to_string();
            self.state.validate_available(&champion)?;
            Ok(champion)
        });
        match result {
            Ok(champion) => {
                self.timer.stop();
                self.commit_phase(champion);
            }
            Err(e) => self.reply_err(connection_id, &e),
        }
    }

    fn handle_timer_expired(&mut self, generation: u64) {
        if generation != self.timer.generation() {
            debug!(room_id = %self.config.id, generation, "stale timer expiry ignored");
            return;
        }
        if !self.state.started || self.state.is_complete() || self.pause.is_paused() {
            return;
        }
        let Some(phase) = self.state.current_phase() else {
            return;
        };
        let champion = match phase.action {
            domain::models::draft::PhaseAction::Ban => NO_CHAMPION.to_string(),
            domain::models::draft::PhaseAction::Pick => self.random_available_champion(),
        };
        info!(
            room_id = %self.config.id,
            phase_index = self.state.phase_index,
            champion = %champion,
            "phase timer expired, auto-advancing"
        );
        self.commit_phase(champion);
    }

    fn random_available_champion(&self) -> String {
        let pool: Vec<String> = self
            .catalog
            .list()
            .into_iter()
            .filter(|c| c != NO_CHAMPION && self.state.validate_available(c).is_ok())
            .collect();
        match pool.choose(&mut rand::rng()) {
            Some(champion) => champion.clone(),
            None => {
                warn!(room_id = %self.config.id, "champion universe exhausted, committing none");
                NO_CHAMPION.to_string()
            }
        }
    }

    /// Record the phase outcome, then either finish the draft or announce
    /// the next phase and restart the timer.
    fn commit_phase(&mut self, champion_id: String) {
        let committed = match self.state.commit_current(champion_id) {
            Ok(committed) => committed,
            Err(e) => {
                // Validation happens before commit; reaching this is a bug.
                warn!(room_id = %self.config.id, error = %e, "phase commit failed");
                return;
            }
        };
        self.broadcast_event(DraftEvent::ChampionSelected {
            side: committed.phase.team,
            action_type: committed.phase.action,
            champion_id: committed.champion_id,
            phase_index: committed.phase_index,
        });

        if committed.is_complete {
            self.timer.stop();
            info!(room_id = %self.config.id, "draft completed");
            self.broadcast_event(DraftEvent::DraftCompleted {
                result: self.state.result(),
            });
            self.sync_all();
            if let Some(hooks) = self.hooks.clone() {
                let room_id = self.config.id;
                let result = self.state.result();
                tokio::spawn(async move {
                    hooks.on_draft_completed(room_id, &result).await;
                });
            }
        } else {
            let next = committed.next_phase.expect("not complete");
            self.broadcast_event(DraftEvent::PhaseChanged {
                phase_index: self.state.phase_index,
                team: next.team,
                action: next.action,
                timer_ms: self.config.timer_ms,
            });
            self.timer.start(self.config.timer_ms);
        }
    }

    // --- pause / resume ---

    fn handle_pause(&mut self, connection_id: Uuid) {
        let result = self.captain_context(connection_id).and_then(|(user, side)| {
            if !self.state.started {
                return Err(DomainError::InvalidState("draft has not started".to_string()));
            }
            if self.state.is_complete() {
                return Err(DomainError::InvalidState("draft is complete".to_string()));
            }
            if self.pause.is_paused() {
                return Err(DomainError::AlreadyPaused);
            }
            Ok((user, side))
        });
        match result {
            Ok((user, side)) => {
                let frozen = self.timer.pause();
                self.pause.pause(user, side, frozen);
                info!(room_id = %self.config.id, paused_by = %user, frozen, "draft paused");
                self.broadcast_event(DraftEvent::DraftPaused {
                    paused_by: user,
                    side,
                    frozen_remaining_ms: frozen,
                });
            }
            Err(e) => self.reply_err(connection_id, &e),
        }
    }

    fn handle_resume_ready(&mut self, connection_id: Uuid, ready: bool) {
        let result = self
            .captain_context(connection_id)
            .and_then(|(_, side)| self.pause.set_resume_ready(side, ready).map(|o| (side, o)));
        match result {
            Ok((side, outcome)) => {
                self.broadcast_event(DraftEvent::ResumeReadyChanged { side, ready });
                if let ResumeReadyOutcome::CountdownCancelled { cancelled_by } = outcome {
                    self.broadcast_event(DraftEvent::ResumeReadyChanged {
                        side: side.opposite(),
                        ready: false,
                    });
                    self.broadcast_event(DraftEvent::ResumeCountdown {
                        seconds: 0,
                        cancelled_by: Some(cancelled_by),
                    });
                }
            }
            Err(e) => self.reply_err(connection_id, &e),
        }
    }

    fn do_resume(&mut self, reason: &str) {
        if self.edits.clear().is_some() {
            self.broadcast_event(DraftEvent::EditRejected {
                reason: "cancelled".to_string(),
            });
        }
        match self.pause.resume() {
            Ok(frozen) => {
                info!(room_id = %self.config.id, reason, frozen, "draft resumed");
                self.broadcast_event(DraftEvent::DraftResumed {
                    reason: reason.to_string(),
                });
                if self.state.started && !self.state.is_complete() {
                    self.timer.resume(frozen);
                }
            }
            Err(_) => debug!(room_id = %self.config.id, "duplicate resume ignored"),
        }
    }

    // --- edits ---

    fn handle_propose_edit(&mut self, connection_id: Uuid, slot: EditSlot, champion_id: String) {
        let result = self.captain_context(connection_id).and_then(|(user, side)| {
            if !self.pause.is_paused() {
                return Err(DomainError::NotPaused);
            }
            self.edits
                .propose(&self.state, user, side, slot, champion_id)
        });
        match result {
            Ok(edit) => self.broadcast_event(DraftEvent::EditProposed { edit }),
            Err(e) => self.reply_err(connection_id, &e),
        }
    }

    fn handle_respond_edit(&mut self, connection_id: Uuid, accept: bool) {
        let result = self
            .captain_context(connection_id)
            .and_then(|(user, side)| self.edits.take_for_response(user, side, accept));
        match result {
            Ok(edit) if accept => match self.state.apply_edit(&edit.slot, &edit.new_champion_id) {
                Ok(old) => {
                    self.broadcast_event(DraftEvent::EditApplied {
                        slot: edit.slot,
                        old_champion_id: old,
                        new_champion_id: edit.new_champion_id,
                        result: self.state.result(),
                    });
                }
                Err(e) => self.reply_err(connection_id, &e),
            },
            Ok(_) => self.broadcast_event(DraftEvent::EditRejected {
                reason: "rejected".to_string(),
            }),
            Err(e) => self.reply_err(connection_id, &e),
        }
    }

    // --- queries ---

    fn obligation_for(&self, user_id: Uuid) -> Option<ObligationKind> {
        if !self.state.started || self.state.is_complete() {
            return None;
        }
        if let Some(edit) = self.edits.pending() {
            if self.is_captain(user_id, edit.proposer_side.opposite()) {
                return Some(ObligationKind::EditAwaitingResponse);
            }
        }
        if self.pause.is_paused() {
            for side in [Side::Blue, Side::Red] {
                if !self.pause.state().resume_ready(side) && self.is_captain(user_id, side) {
                    return Some(ObligationKind::ResumeReadyPending);
                }
            }
            return None;
        }
        let phase = self.state.current_phase()?;
        if self.is_captain(user_id, phase.team) {
            return Some(ObligationKind::YourTurn);
        }
        None
    }

    // --- helpers ---

    fn seated_side(&self, connection_id: Uuid) -> DomainResult<(Uuid, Side)> {
        let seat = self
            .seats
            .get(&connection_id)
            .ok_or(DomainError::Unauthorized)?;
        let side = seat.side.side().ok_or(DomainError::Unauthorized)?;
        Ok((seat.user_id, side))
    }

    /// The caller's seat, requiring captaincy of their own side.
    fn captain_context(&self, connection_id: Uuid) -> DomainResult<(Uuid, Side)> {
        let (user_id, side) = self.seated_side(connection_id)?;
        if !self.is_captain(user_id, side) {
            return Err(DomainError::Unauthorized);
        }
        Ok((user_id, side))
    }

    /// The caller's seat, requiring that it is their side's turn and that
    /// they are empowered to act on it.
    fn acting_context(&self, connection_id: Uuid) -> DomainResult<(Uuid, Side)> {
        if !self.state.started {
            return Err(DomainError::InvalidState("draft has not started".to_string()));
        }
        if self.pause.is_paused() {
            return Err(DomainError::InvalidState("draft is paused".to_string()));
        }
        let seat = self
            .seats
            .get(&connection_id)
            .ok_or(DomainError::Unauthorized)?;
        let side = seat.side.side().ok_or(DomainError::NotYourTurn)?;
        let phase = self
            .state
            .current_phase()
            .ok_or_else(|| DomainError::InvalidState("draft is complete".to_string()))?;
        if phase.team != side || !self.is_captain(seat.user_id, side) {
            return Err(DomainError::NotYourTurn);
        }
        Ok((seat.user_id, side))
    }

    fn is_captain(&self, user_id: Uuid, side: Side) -> bool {
        match &self.config.roster {
            Some(roster) => roster
                .iter()
                .any(|p| p.user_id == user_id && p.team == side && p.captain),
            None => match side {
                Side::Blue => self.occupancy.blue == Some(user_id),
                Side::Red => self.occupancy.red == Some(user_id),
            },
        }
    }

    fn side_connected(&self, side: Side) -> bool {
        let seat_side = SeatSide::from(side);
        self.seats.values().any(|s| s.side == seat_side)
    }

    async fn display_name(&self, user_id: Uuid) -> String {
        if let Some(roster) = &self.config.roster {
            if let Some(player) = roster.iter().find(|p| p.user_id == user_id) {
                return player.display_name.clone();
            }
        }
        self.directory.lookup(user_id).await.display_name
    }

    fn reply_err(&self, connection_id: Uuid, err: &DomainError) {
        debug!(room_id = %self.config.id, code = err.code(), "rejecting draft command");
        self.emitter
            .send_to(connection_id, &DraftServerFrame::err(err.code(), err.to_string()));
    }

    fn broadcast_event(&self, event: DraftEvent) {
        let seq = self.emitter.next_seq();
        self.emitter.broadcast(&DraftServerFrame::event(event, seq));
    }

    fn sync_one(&self, connection_id: Uuid) {
        let snapshot = self.snapshot_for(connection_id);
        self.emitter
            .send_to(connection_id, &DraftServerFrame::state(snapshot));
    }

    fn sync_all(&self) {
        for connection_id in self.emitter.connection_ids() {
            self.sync_one(connection_id);
        }
    }

    fn snapshot_for(&self, connection_id: Uuid) -> DraftSnapshot {
        let seat = self.seats.get(&connection_id);
        let your_side = seat.map(|s| s.side).unwrap_or(SeatSide::Spectator);
        let you_are_captain = seat
            .and_then(|s| s.side.side().map(|side| self.is_captain(s.user_id, side)))
            .unwrap_or(false);

        let status = if self.state.is_complete() {
            RoomStatus::Completed
        } else if self.pause.is_paused() {
            RoomStatus::Paused
        } else if self.state.started {
            RoomStatus::InProgress
        } else {
            RoomStatus::Waiting
        };
        let current = self.state.current_phase();

        DraftSnapshot {
            room_id: self.config.id,
            short_code: self.config.short_code.clone(),
            mode: self.state.mode,
            team_draft: self.config.roster.is_some(),
            status,
            started: self.state.started,
            is_complete: self.state.is_complete(),
            phase_index: self.state.phase_index,
            total_phases: self.state.total_phases(),
            current_team: current.map(|p| p.team),
            current_action: current.map(|p| p.action),
            blue_bans: self.state.blue_bans.clone(),
            red_bans: self.state.red_bans.clone(),
            blue_picks: self.state.blue_picks.clone(),
            red_picks: self.state.red_picks.clone(),
            fearless_bans: self.state.fearless_bans.clone(),
            blue_ready: self.state.blue_ready,
            red_ready: self.state.red_ready,
            blue_hover: self.state.blue_hover.clone(),
            red_hover: self.state.red_hover.clone(),
            timer_remaining_ms: if self.pause.is_paused() {
                self.pause.state().frozen_remaining_ms
            } else {
                self.timer.remaining_ms()
            },
            in_buffer: self.timer.in_buffer(),
            pause: self.pause.is_paused().then(|| self.pause.state().clone()),
            pending_edit: self.edits.pending().cloned(),
            roster: self.config.roster.as_ref().map(|roster| {
                roster
                    .iter()
                    .map(|p| RoomPlayerView {
                        user_id: p.user_id,
                        display_name: p.display_name.clone(),
                        team: p.team,
                        role: p.role,
                        captain: p.captain,
                    })
                    .collect()
            }),
            seats: self.occupancy,
            your_side,
            you_are_captain,
        }
    }
}
