use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::draft::Side;

/// The five assigned lanes of a full team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Top,
    Jungle,
    Mid,
    Adc,
    Support,
}

impl Role {
    pub const ALL: [Role; 5] = [Role::Top, Role::Jungle, Role::Mid, Role::Adc, Role::Support];
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Top => write!(f, "top"),
            Role::Jungle => write!(f, "jungle"),
            Role::Mid => write!(f, "mid"),
            Role::Adc => write!(f, "adc"),
            Role::Support => write!(f, "support"),
        }
    }
}

/// A seat in a lobby. Created on join, destroyed on leave or kick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyPlayer {
    pub id: Uuid,
    pub user_id: Uuid,
    pub display_name: String,
    pub team: Option<Side>,
    pub role: Option<Role>,
    pub ready: bool,
    pub captain: bool,
    pub join_order: u32,
}

impl LobbyPlayer {
    pub fn new(user_id: Uuid, display_name: String, join_order: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            display_name,
            team: None,
            role: None,
            ready: false,
            captain: false,
            join_order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_player_defaults() {
        let user_id = Uuid::new_v4();
        let player = LobbyPlayer::new(user_id, "Faker".to_string(), 3);
        assert_eq!(player.user_id, user_id);
        assert_eq!(player.join_order, 3);
        assert!(player.team.is_none());
        assert!(player.role.is_none());
        assert!(!player.ready);
        assert!(!player.captain);
    }

    #[test]
    fn test_role_serde() {
        assert_eq!(serde_json::to_string(&Role::Support).unwrap(), "\"support\"");
        let parsed: Role = serde_json::from_str("\"jungle\"").unwrap();
        assert_eq!(parsed, Role::Jungle);
    }
}
