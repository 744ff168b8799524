use thiserror::Error;

/// Closed set of domain failures. Each variant maps to an opaque on-wire
/// error code via [`DomainError::code`]; richer detail stays server-side.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("invalid slot: {0}")]
    InvalidSlot(String),

    #[error("lobby is full")]
    LobbyFull,

    #[error("user is already in this lobby")]
    AlreadyInLobby,

    #[error("it is not your turn to act")]
    NotYourTurn,

    #[error("champion is unavailable: {0}")]
    ChampionUnavailable(String),

    #[error("draft has already started")]
    AlreadyStarted,

    #[error("both sides must be ready")]
    NotReady,

    #[error("a player is missing on one or both sides")]
    MissingPlayers,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("an edit is already pending")]
    EditPending,

    #[error("no edit is pending")]
    NoEdit,

    #[error("draft is already paused")]
    AlreadyPaused,

    #[error("draft is not paused")]
    NotPaused,

    #[error("caller is not allowed to perform this action")]
    Unauthorized,

    #[error("side is already taken")]
    SideTaken,

    #[error("caller may not confirm this edit")]
    InvalidConfirm,

    #[error("caller may not reject this edit")]
    InvalidReject,

    #[error("an action is already pending")]
    ActionPending,

    #[error("no such pending action")]
    NoAction,

    #[error("room not found: {0}")]
    RoomNotFound(String),

    #[error("lobby not found: {0}")]
    LobbyNotFound(String),

    #[error("duplicate session id: {0}")]
    DuplicateSession(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    /// The opaque code sent to clients in `ERR` frames and lobby `error`
    /// messages. Internal error text never travels with it.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::InvalidPayload(_) => "INVALID_PAYLOAD",
            DomainError::InvalidSlot(_) => "INVALID_SLOT",
            DomainError::LobbyFull => "LOBBY_FULL",
            DomainError::AlreadyInLobby => "ALREADY_IN_LOBBY",
            DomainError::NotYourTurn => "NOT_YOUR_TURN",
            DomainError::ChampionUnavailable(_) => "CHAMPION_UNAVAILABLE",
            DomainError::AlreadyStarted => "ALREADY_STARTED",
            DomainError::NotReady => "NOT_READY",
            DomainError::MissingPlayers => "MISSING_PLAYERS",
            DomainError::InvalidState(_) => "INVALID_STATE",
            DomainError::EditPending => "EDIT_PENDING",
            DomainError::NoEdit => "NO_EDIT",
            DomainError::AlreadyPaused => "ALREADY_PAUSED",
            DomainError::NotPaused => "NOT_PAUSED",
            DomainError::Unauthorized => "UNAUTHORIZED",
            DomainError::SideTaken => "SIDE_TAKEN",
            DomainError::InvalidConfirm => "INVALID_CONFIRM",
            DomainError::InvalidReject => "INVALID_REJECT",
            DomainError::ActionPending => "ACTION_PENDING",
            DomainError::NoAction => "NO_ACTION",
            DomainError::RoomNotFound(_) => "ROOM_NOT_FOUND",
            DomainError::LobbyNotFound(_) => "LOBBY_NOT_FOUND",
            DomainError::DuplicateSession(_) => "DUPLICATE_SESSION",
            DomainError::Internal(_) => "INTERNAL",
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(DomainError::NotYourTurn.code(), "NOT_YOUR_TURN");
        assert_eq!(
            DomainError::ChampionUnavailable("Aatrox".to_string()).code(),
            "CHAMPION_UNAVAILABLE"
        );
        assert_eq!(DomainError::SideTaken.code(), "SIDE_TAKEN");
        assert_eq!(DomainError::LobbyFull.code(), "LOBBY_FULL");
    }

    #[test]
    fn test_internal_detail_not_in_code() {
        let err = DomainError::Internal("catalog fetch failed".to_string());
        assert_eq!(err.code(), "INTERNAL");
        assert!(err.to_string().contains("catalog fetch failed"));
    }
}
