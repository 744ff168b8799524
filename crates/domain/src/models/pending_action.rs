use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{DomainError, DomainResult};
use crate::models::draft::Side;

/// Lifetime of a pending action before the sweeper cancels it.
pub const ACTION_TTL_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Matchmake,
    SelectOption,
    SwapPlayers,
    SwapRoles,
    PromoteCaptain,
    Kick,
    StartDraft,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActionType::Matchmake => "matchmake",
            ActionType::SelectOption => "select_option",
            ActionType::SwapPlayers => "swap_players",
            ActionType::SwapRoles => "swap_roles",
            ActionType::PromoteCaptain => "promote_captain",
            ActionType::Kick => "kick",
            ActionType::StartDraft => "start_draft",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Approved,
    Executed,
    Cancelled,
    Expired,
}

/// A joint lobby decision awaiting the other captain's approval. The
/// proposer's own side is pre-approved on creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    pub id: Uuid,
    pub action: ActionType,
    pub proposer_user_id: Uuid,
    pub proposer_side: Side,
    pub target_player_ids: Vec<Uuid>,
    pub option_number: Option<u32>,
    pub approved_by_blue: bool,
    pub approved_by_red: bool,
    pub expires_at: DateTime<Utc>,
    pub status: ActionStatus,
}

impl PendingAction {
    pub fn new(
        action: ActionType,
        proposer_user_id: Uuid,
        proposer_side: Side,
        target_player_ids: Vec<Uuid>,
        option_number: Option<u32>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            proposer_user_id,
            proposer_side,
            target_player_ids,
            option_number,
            approved_by_blue: proposer_side == Side::Blue,
            approved_by_red: proposer_side == Side::Red,
            expires_at: Utc::now() + Duration::seconds(ACTION_TTL_SECS),
            status: ActionStatus::Pending,
        }
    }

    pub fn approved_by(&self, side: Side) -> bool {
        match side {
            Side::Blue => self.approved_by_blue,
            Side::Red => self.approved_by_red,
        }
    }

    /// Record one side's approval. Returns true once both sides agree, at
    /// which point the caller runs the action's execute hook.
    pub fn approve(&mut self, side: Side) -> DomainResult<bool> {
        if self.status != ActionStatus::Pending {
            return Err(DomainError::InvalidState(format!(
                "action is {:?}",
                self.status
            )));
        }
        match side {
            Side::Blue => self.approved_by_blue = true,
            Side::Red => self.approved_by_red = true,
        }
        if self.approved_by_blue && self.approved_by_red {
            self.status = ActionStatus::Approved;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proposer_side_is_pre_approved() {
        let action = PendingAction::new(
            ActionType::SwapPlayers,
            Uuid::new_v4(),
            Side::Red,
            vec![Uuid::new_v4(), Uuid::new_v4()],
            None,
        );
        assert!(action.approved_by_red);
        assert!(!action.approved_by_blue);
        assert_eq!(action.status, ActionStatus::Pending);
    }

    #[test]
    fn test_approve_other_side_completes() {
        let mut action = PendingAction::new(
            ActionType::StartDraft,
            Uuid::new_v4(),
            Side::Blue,
            vec![],
            None,
        );
        // Re-approving one's own side does not complete the action.
        assert!(!action.approve(Side::Blue).unwrap());
        assert!(action.approve(Side::Red).unwrap());
        assert_eq!(action.status, ActionStatus::Approved);

        // A settled action cannot be approved again.
        assert!(action.approve(Side::Red).is_err());
    }

    #[test]
    fn test_expiry_window() {
        let action =
            PendingAction::new(ActionType::Matchmake, Uuid::new_v4(), Side::Blue, vec![], None);
        assert!(!action.is_expired(Utc::now()));
        assert!(action.is_expired(Utc::now() + Duration::seconds(ACTION_TTL_SECS + 1)));
    }
}
