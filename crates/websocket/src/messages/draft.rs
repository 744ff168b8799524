use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use domain::models::draft::{DraftMode, DraftResult, PhaseAction, Side};
use domain::models::pause::PauseState;
use domain::models::pending_edit::{EditSlot, PendingEdit};
use domain::models::player::Role;

/// A client's relationship to a draft room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatSide {
    Blue,
    Red,
    Spectator,
}

impl SeatSide {
    /// The acting side, if any. Spectators have none.
    pub fn side(&self) -> Option<Side> {
        match self {
            SeatSide::Blue => Some(Side::Blue),
            SeatSide::Red => Some(Side::Red),
            SeatSide::Spectator => None,
        }
    }
}

impl From<Side> for SeatSide {
    fn from(side: Side) -> Self {
        match side {
            Side::Blue => SeatSide::Blue,
            Side::Red => SeatSide::Red,
        }
    }
}

/// Messages sent from draft clients to the server. A single JSON text frame
/// carries one envelope; anything unparseable earns an `ERR` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DraftClientFrame {
    #[serde(rename = "COMMAND")]
    Command {
        #[serde(flatten)]
        action: DraftAction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp_ms: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seq: Option<u64>,
    },
    #[serde(rename = "QUERY")]
    Query {
        query: DraftQuery,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp_ms: Option<i64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload", rename_all = "snake_case")]
pub enum DraftAction {
    JoinRoom {
        room_id: Uuid,
        /// Advisory in team mode; honored in 1v1 mode unless taken.
        #[serde(default)]
        side: Option<Side>,
    },
    SelectChampion {
        champion_id: String,
    },
    LockIn,
    HoverChampion {
        #[serde(default)]
        champion_id: Option<String>,
    },
    SetReady {
        ready: bool,
    },
    StartDraft,
    PauseDraft,
    ResumeReady {
        ready: bool,
    },
    ProposeEdit {
        slot: EditSlot,
        champion_id: String,
    },
    RespondEdit {
        accept: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftQuery {
    SyncState,
}

/// Messages sent from the server to draft clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DraftServerFrame {
    #[serde(rename = "STATE")]
    State {
        payload: Box<DraftSnapshot>,
        timestamp_ms: i64,
    },
    #[serde(rename = "EVENT")]
    Event {
        #[serde(flatten)]
        event: DraftEvent,
        timestamp_ms: i64,
        seq: u64,
    },
    #[serde(rename = "TIMER")]
    Timer {
        payload: TimerTick,
        timestamp_ms: i64,
    },
    #[serde(rename = "ERR")]
    Err {
        code: String,
        message: String,
        timestamp_ms: i64,
    },
}

impl DraftServerFrame {
    pub fn state(snapshot: DraftSnapshot) -> Self {
        DraftServerFrame::State {
            payload: Box::new(snapshot),
            timestamp_ms: Utc::now().timestamp_millis(),
        }
    }

    pub fn event(event: DraftEvent, seq: u64) -> Self {
        DraftServerFrame::Event {
            event,
            timestamp_ms: Utc::now().timestamp_millis(),
            seq,
        }
    }

    pub fn timer(tick: TimerTick) -> Self {
        DraftServerFrame::Timer {
            payload: tick,
            timestamp_ms: Utc::now().timestamp_millis(),
        }
    }

    pub fn err(code: &str, message: impl Into<String>) -> Self {
        DraftServerFrame::Err {
            code: code.to_string(),
            message: message.into(),
            timestamp_ms: Utc::now().timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimerTick {
    pub remaining_ms: u64,
    pub in_buffer: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum DraftEvent {
    PlayerJoined {
        user_id: Uuid,
        display_name: String,
        side: SeatSide,
    },
    PlayerLeft {
        user_id: Uuid,
        side: SeatSide,
    },
    ReadyChanged {
        side: Side,
        ready: bool,
    },
    DraftStarted,
    ChampionHovered {
        side: Side,
        champion_id: Option<String>,
    },
    ChampionSelected {
        side: Side,
        action_type: PhaseAction,
        champion_id: String,
        phase_index: usize,
    },
    PhaseChanged {
        phase_index: usize,
        team: Side,
        action: PhaseAction,
        timer_ms: u64,
    },
    DraftCompleted {
        result: DraftResult,
    },
    DraftPaused {
        paused_by: Uuid,
        side: Side,
        frozen_remaining_ms: u64,
    },
    ResumeReadyChanged {
        side: Side,
        ready: bool,
    },
    ResumeCountdown {
        seconds: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cancelled_by: Option<Side>,
    },
    DraftResumed {
        reason: String,
    },
    EditProposed {
        edit: PendingEdit,
    },
    EditApplied {
        slot: EditSlot,
        old_champion_id: String,
        new_champion_id: String,
        result: DraftResult,
    },
    EditRejected {
        reason: String,
    },
}

/// Derived room status for snapshots, mirroring the lobby's status values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Waiting,
    InProgress,
    Paused,
    Completed,
}

/// One roster seat of a team-mode draft room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomPlayerView {
    pub user_id: Uuid,
    pub display_name: String,
    pub team: Side,
    pub role: Option<Role>,
    pub captain: bool,
}

/// Claimed seats of a 1v1 room.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatOccupancy {
    pub blue: Option<Uuid>,
    pub red: Option<Uuid>,
}

/// Full authoritative room state, sent on admit and on major transitions.
/// A client that applies every subsequent event to this snapshot holds the
/// same state as the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSnapshot {
    pub room_id: Uuid,
    pub short_code: String,
    pub mode: DraftMode,
    pub team_draft: bool,
    pub status: RoomStatus,
    pub started: bool,
    pub is_complete: bool,
    pub phase_index: usize,
    pub total_phases: usize,
    pub current_team: Option<Side>,
    pub current_action: Option<PhaseAction>,
    pub blue_bans: Vec<String>,
    pub red_bans: Vec<String>,
    pub blue_picks: Vec<String>,
    pub red_picks: Vec<String>,
    pub fearless_bans: Vec<String>,
    pub blue_ready: bool,
    pub red_ready: bool,
    pub blue_hover: Option<String>,
    pub red_hover: Option<String>,
    pub timer_remaining_ms: u64,
    pub in_buffer: bool,
    pub pause: Option<PauseState>,
    pub pending_edit: Option<PendingEdit>,
    pub roster: Option<Vec<RoomPlayerView>>,
    pub seats: SeatOccupancy,
    pub your_side: SeatSide,
    pub you_are_captain: bool,
}
