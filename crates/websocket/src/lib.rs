pub mod draft_room;
pub mod edit_manager;
pub mod emitter;
pub mod hub;
pub mod lobby_session;
pub mod messages;
pub mod pause_manager;

pub use draft_room::{DraftRoomConfig, RoomHandle, RoomPlayer};
pub use emitter::{SessionEmitter, OUTBOUND_BUFFER};
pub use hub::{Hub, HubRoomFactory, PendingObligation};
pub use lobby_session::LobbyHandle;
