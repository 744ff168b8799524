pub mod draft;
pub mod lobby;
pub mod match_option;
pub mod pause;
pub mod pending_action;
pub mod pending_edit;
pub mod player;
pub mod session;

pub use draft::{
    phase_sequence, DraftMode, DraftResult, DraftState, Phase, PhaseAction, Side, NO_CHAMPION,
};
pub use lobby::{Lobby, LobbyConfig, LobbyStatus, Vote, VotingConfig, VotingMode, VotingStatus};
pub use match_option::{Assignment, LaneDiff, MatchOption, TeamStats};
pub use pause::PauseState;
pub use pending_action::{ActionStatus, ActionType, PendingAction};
pub use pending_edit::{EditSlot, PendingEdit};
pub use player::{LobbyPlayer, Role};
pub use session::generate_short_code;
