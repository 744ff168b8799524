pub mod draft;
pub mod lobby;

pub use draft::{
    DraftAction, DraftClientFrame, DraftEvent, DraftQuery, DraftServerFrame, DraftSnapshot,
    RoomPlayerView, RoomStatus, SeatOccupancy, SeatSide, TimerTick,
};
pub use lobby::{ActionProposal, LobbyClientMessage, LobbyServerMessage, LobbySnapshot};
