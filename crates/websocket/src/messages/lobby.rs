use serde::{Deserialize, Serialize};
use uuid::Uuid;

use domain::models::draft::{DraftMode, Side};
use domain::models::lobby::{LobbyStatus, Vote, VotingStatus};
use domain::models::match_option::{MatchOption, TeamStats};
use domain::models::pending_action::{ActionType, PendingAction};
use domain::models::player::LobbyPlayer;

/// Messages sent from lobby clients to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum LobbyClientMessage {
    /// Must be the first frame after the upgrade.
    JoinLobby { lobby_id: Uuid },
    LeaveLobby,
    SetReady { ready: bool },
    ToggleVote { option_number: u32 },
    EndVoting {
        #[serde(default)]
        force_option: Option<u32>,
    },
    TakeCaptain,
    PromoteCaptain { target_user_id: Uuid },
    KickPlayer { target_user_id: Uuid },
    ProposeAction { action: ActionProposal },
    ApproveAction { action_id: Uuid },
    CancelAction { action_id: Uuid },
    SyncState,
    Ping,
}

/// Payload of a joint-action proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionProposal {
    pub action_type: ActionType,
    #[serde(default)]
    pub target_player_ids: Vec<Uuid>,
    #[serde(default)]
    pub option_number: Option<u32>,
}

/// Messages sent from the server to lobby clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LobbyServerMessage {
    LobbyStateSync {
        payload: Box<LobbySnapshot>,
    },
    PlayerJoined {
        user_id: Uuid,
        display_name: String,
        join_order: u32,
    },
    PlayerLeft {
        user_id: Uuid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        new_creator: Option<Uuid>,
    },
    PlayerReadyChanged {
        user_id: Uuid,
        ready: bool,
    },
    StatusChanged {
        status: LobbyStatus,
    },
    MatchOptionsGenerated {
        options: Vec<MatchOption>,
    },
    TeamSelected {
        option_number: u32,
        players: Vec<LobbyPlayer>,
        stats: TeamStats,
    },
    VoteCast {
        user_id: Uuid,
        option_number: u32,
        active: bool,
    },
    ActionProposed {
        action: PendingAction,
    },
    ActionApproved {
        action_id: Uuid,
        side: Side,
    },
    ActionExecuted {
        action: PendingAction,
    },
    ActionCancelled {
        action_id: Uuid,
        cancelled_by: String,
    },
    DraftStarting {
        room_id: Uuid,
        short_code: String,
    },
    CaptainChanged {
        team: Side,
        user_id: Uuid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous: Option<Uuid>,
    },
    PlayerKicked {
        user_id: Uuid,
        kicked_by: Uuid,
    },
    TeamStatsUpdated {
        stats: TeamStats,
    },
    VotingStatusUpdated {
        status: VotingStatus,
    },
    Error {
        code: String,
        message: String,
    },
    Pong,
}

impl LobbyServerMessage {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        LobbyServerMessage::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Full lobby view sent on admit and on `sync_state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LobbySnapshot {
    pub lobby_id: Uuid,
    pub short_code: String,
    pub creator_user_id: Uuid,
    pub status: LobbyStatus,
    pub draft_mode: DraftMode,
    pub timer_secs: u32,
    pub room_id: Option<Uuid>,
    pub room_short_code: Option<String>,
    pub selected_match_option: Option<u32>,
    pub players: Vec<LobbyPlayer>,
    pub options: Vec<MatchOption>,
    pub votes: Vec<Vote>,
    pub pending_action: Option<PendingAction>,
    pub voting: VotingStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_lobby_round_trip() {
        let lobby_id = Uuid::new_v4();
        let msg = LobbyClientMessage::JoinLobby { lobby_id };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"join_lobby\""));
        let parsed: LobbyClientMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_ping_has_no_payload() {
        let parsed: LobbyClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(parsed, LobbyClientMessage::Ping);
        assert_eq!(
            serde_json::to_string(&LobbyServerMessage::Pong).unwrap(),
            r#"{"type":"pong"}"#
        );
    }

    #[test]
    fn test_propose_action_defaults() {
        let json = r#"{"type":"propose_action","payload":{"action":{"action_type":"start_draft"}}}"#;
        let parsed: LobbyClientMessage = serde_json::from_str(json).unwrap();
        match parsed {
            LobbyClientMessage::ProposeAction { action } => {
                assert_eq!(action.action_type, ActionType::StartDraft);
                assert!(action.target_player_ids.is_empty());
                assert_eq!(action.option_number, None);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_server_error_shape() {
        let msg = LobbyServerMessage::error("LOBBY_NOT_FOUND", "lobby not found: abc");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"error\""));
        assert!(json.contains("\"code\":\"LOBBY_NOT_FOUND\""));
    }

    #[test]
    fn test_draft_starting_event() {
        let room_id = Uuid::new_v4();
        let msg = LobbyServerMessage::DraftStarting {
            room_id,
            short_code: "XK29QPLM".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"draft_starting\""));
        assert!(json.contains("XK29QPLM"));
        let parsed: LobbyServerMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let json = r#"{"type":"shout","payload":{}}"#;
        assert!(serde_json::from_str::<LobbyClientMessage>(json).is_err());
    }
}
