use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::draft::Side;
use crate::models::player::Role;

/// One player's slot in a candidate composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub user_id: Uuid,
    pub team: Side,
    pub role: Role,
    pub role_mmr: i32,
    pub comfort: f64,
}

/// One candidate (blue roster, red roster) pairing produced by the team
/// generator. Never mutated after generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOption {
    pub option_number: u32,
    pub algorithm: String,
    pub blue_avg_mmr: f64,
    pub red_avg_mmr: f64,
    pub blue_avg_comfort: f64,
    pub red_avg_comfort: f64,
    pub mmr_difference: f64,
    pub balance_score: f64,
    pub max_lane_diff: i32,
    pub assignments: Vec<Assignment>,
}

impl MatchOption {
    pub fn team_assignments(&self, team: Side) -> impl Iterator<Item = &Assignment> {
        self.assignments.iter().filter(move |a| a.team == team)
    }
}

/// Per-lane MMR gap between the two assigned players.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneDiff {
    pub role: Role,
    pub diff: i32,
}

/// Aggregate stats for the currently selected composition, broadcast to the
/// lobby after a team option is applied or players are swapped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamStats {
    pub blue_avg_mmr: f64,
    pub red_avg_mmr: f64,
    pub mmr_difference: f64,
    pub blue_avg_comfort: f64,
    pub red_avg_comfort: f64,
    pub lane_diffs: Vec<LaneDiff>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option_with_two_assignments() -> MatchOption {
        MatchOption {
            option_number: 1,
            algorithm: "balanced".to_string(),
            blue_avg_mmr: 1500.0,
            red_avg_mmr: 1490.0,
            blue_avg_comfort: 0.8,
            red_avg_comfort: 0.7,
            mmr_difference: 10.0,
            balance_score: 0.95,
            max_lane_diff: 40,
            assignments: vec![
                Assignment {
                    user_id: Uuid::new_v4(),
                    team: Side::Blue,
                    role: Role::Mid,
                    role_mmr: 1500,
                    comfort: 0.9,
                },
                Assignment {
                    user_id: Uuid::new_v4(),
                    team: Side::Red,
                    role: Role::Mid,
                    role_mmr: 1480,
                    comfort: 0.6,
                },
            ],
        }
    }

    #[test]
    fn test_team_assignments_filter() {
        let option = option_with_two_assignments();
        assert_eq!(option.team_assignments(Side::Blue).count(), 1);
        assert_eq!(option.team_assignments(Side::Red).count(), 1);
        assert!(option
            .team_assignments(Side::Blue)
            .all(|a| a.team == Side::Blue));
    }

    #[test]
    fn test_option_serde_round_trip() {
        let option = option_with_two_assignments();
        let json = serde_json::to_string(&option).unwrap();
        let parsed: MatchOption = serde_json::from_str(&json).unwrap();
        assert_eq!(option, parsed);
    }
}
