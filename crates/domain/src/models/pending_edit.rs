use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::draft::{PhaseAction, Side};

/// Lifetime of a proposed edit before it is rejected with reason `timeout`.
pub const EDIT_TTL_SECS: i64 = 30;

/// Identifies one slot in the four draft lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditSlot {
    #[serde(rename = "type")]
    pub kind: PhaseAction,
    pub team: Side,
    pub index: usize,
}

/// A pause-time slot mutation awaiting the opposing captain's approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEdit {
    pub id: Uuid,
    pub proposer_user_id: Uuid,
    pub proposer_side: Side,
    pub slot: EditSlot,
    pub old_champion_id: String,
    pub new_champion_id: String,
    pub expires_at: DateTime<Utc>,
}

impl PendingEdit {
    pub fn new(
        proposer_user_id: Uuid,
        proposer_side: Side,
        slot: EditSlot,
        old_champion_id: String,
        new_champion_id: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            proposer_user_id,
            proposer_side,
            slot,
            old_champion_id,
            new_champion_id,
            expires_at: Utc::now() + Duration::seconds(EDIT_TTL_SECS),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_serde_uses_type_key() {
        let slot = EditSlot { kind: PhaseAction::Ban, team: Side::Blue, index: 0 };
        let json = serde_json::to_string(&slot).unwrap();
        assert!(json.contains("\"type\":\"ban\""));
        assert!(json.contains("\"team\":\"blue\""));
        let parsed: EditSlot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, slot);
    }

    #[test]
    fn test_edit_expiry_window() {
        let edit = PendingEdit::new(
            Uuid::new_v4(),
            Side::Blue,
            EditSlot { kind: PhaseAction::Ban, team: Side::Blue, index: 0 },
            "Aatrox".to_string(),
            "Ahri".to_string(),
        );
        assert!(!edit.is_expired(Utc::now()));
        assert!(edit.is_expired(Utc::now() + Duration::seconds(EDIT_TTL_SECS + 1)));
    }
}
