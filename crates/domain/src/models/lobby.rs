use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{DomainError, DomainResult};
use crate::models::draft::{DraftMode, Side};
use crate::models::match_option::{LaneDiff, MatchOption, TeamStats};
use crate::models::pending_action::{ActionStatus, ActionType, PendingAction};
use crate::models::player::{LobbyPlayer, Role};

pub const MAX_PLAYERS: usize = 10;
pub const TEAM_SIZE: usize = 5;

/// Votes needed to finalize in majority mode (⌈N/2⌉ + 1 of ten).
pub const MAJORITY_THRESHOLD: usize = MAX_PLAYERS / 2 + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LobbyStatus {
    WaitingForPlayers,
    Matchmaking,
    TeamSelected,
    Drafting,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingMode {
    Majority,
    Unanimous,
    CaptainOverride,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VotingConfig {
    pub enabled: bool,
    pub mode: VotingMode,
    pub deadline: Option<DateTime<Utc>>,
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: VotingMode::Majority,
            deadline: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub user_id: Uuid,
    pub option_number: u32,
}

/// Voting progress broadcast as `voting_status_updated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VotingStatus {
    pub enabled: bool,
    pub mode: VotingMode,
    pub deadline: Option<DateTime<Utc>>,
    /// (option number, vote count) for every generated option.
    pub counts: Vec<(u32, usize)>,
    /// Option that a captain may finalize right now, if any.
    pub finalizable_option: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct LobbyConfig {
    pub id: Uuid,
    pub short_code: String,
    pub creator_user_id: Uuid,
    pub draft_mode: DraftMode,
    pub timer_secs: u32,
    pub voting: VotingConfig,
}

/// Outcome of a player removal (leave or kick).
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRemoved {
    pub player: LobbyPlayer,
    pub new_creator: Option<Uuid>,
    pub new_captain: Option<Uuid>,
}

/// Outcome of a captain change, for the `captain_changed` broadcast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptainChange {
    pub team: Side,
    pub user_id: Uuid,
    pub previous: Option<Uuid>,
}

/// One lobby's authoritative state. Mutated only by the owning session's
/// event loop.
#[derive(Debug, Clone)]
pub struct Lobby {
    pub id: Uuid,
    pub short_code: String,
    pub creator_user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub status: LobbyStatus,
    pub draft_mode: DraftMode,
    pub timer_secs: u32,
    pub room_id: Option<Uuid>,
    pub room_short_code: Option<String>,
    pub voting: VotingConfig,
    pub selected_match_option: Option<u32>,
    pub players: Vec<LobbyPlayer>,
    pub options: Vec<MatchOption>,
    pub votes: Vec<Vote>,
    pub pending_action: Option<PendingAction>,
    next_join_order: u32,
}

impl Lobby {
    pub fn new(config: LobbyConfig) -> Self {
        Self {
            id: config.id,
            short_code: config.short_code,
            creator_user_id: config.creator_user_id,
            created_at: Utc::now(),
            status: LobbyStatus::WaitingForPlayers,
            draft_mode: config.draft_mode,
            timer_secs: config.timer_secs,
            room_id: None,
            room_short_code: None,
            voting: config.voting,
            selected_match_option: None,
            players: Vec::new(),
            options: Vec::new(),
            votes: Vec::new(),
            pending_action: None,
            next_join_order: 0,
        }
    }

    pub fn player(&self, user_id: Uuid) -> Option<&LobbyPlayer> {
        self.players.iter().find(|p| p.user_id == user_id)
    }

    fn player_mut(&mut self, user_id: Uuid) -> Option<&mut LobbyPlayer> {
        self.players.iter_mut().find(|p| p.user_id == user_id)
    }

    fn require_player(&self, user_id: Uuid) -> DomainResult<&LobbyPlayer> {
        self.player(user_id).ok_or(DomainError::Unauthorized)
    }

    pub fn side_of(&self, user_id: Uuid) -> Option<Side> {
        self.player(user_id).and_then(|p| p.team)
    }

    pub fn is_captain(&self, user_id: Uuid) -> bool {
        self.player(user_id).map(|p| p.captain).unwrap_or(false)
    }

    pub fn captain_of(&self, team: Side) -> Option<&LobbyPlayer> {
        self.players
            .iter()
            .find(|p| p.captain && p.team == Some(team))
    }

    pub fn has_captains(&self) -> bool {
        self.players.iter().any(|p| p.captain)
    }

    pub fn players_on(&self, team: Side) -> impl Iterator<Item = &LobbyPlayer> {
        self.players.iter().filter(move |p| p.team == Some(team))
    }

    // --- membership ---

    pub fn add_player(&mut self, user_id: Uuid, display_name: String) -> DomainResult<&LobbyPlayer> {
        if self.status == LobbyStatus::Closed {
            return Err(DomainError::InvalidState("lobby is closed".to_string()));
        }
        if self.player(user_id).is_some() {
            return Err(DomainError::AlreadyInLobby);
        }
        if self.players.len() >= MAX_PLAYERS {
            return Err(DomainError::LobbyFull);
        }
        let join_order = self.next_join_order;
        self.next_join_order += 1;
        self.players
            .push(LobbyPlayer::new(user_id, display_name, join_order));
        Ok(self.players.last().expect("just pushed"))
    }

    /// Remove a player (voluntary leave or kick). Passes the creator flag to
    /// the next player in join order and re-normalizes captain flags.
    pub fn remove_player(&mut self, user_id: Uuid) -> DomainResult<PlayerRemoved> {
        let idx = self
            .players
            .iter()
            .position(|p| p.user_id == user_id)
            .ok_or(DomainError::Unauthorized)?;
        let player = self.players.remove(idx);
        self.votes.retain(|v| v.user_id != user_id);

        let mut new_creator = None;
        if player.user_id == self.creator_user_id {
            if let Some(next) = self.players.iter().min_by_key(|p| p.join_order) {
                self.creator_user_id = next.user_id;
                new_creator = Some(next.user_id);
            }
        }

        let mut new_captain = None;
        if player.captain {
            if let Some(team) = player.team {
                new_captain = self.normalize_captains_on(team);
            }
        }

        Ok(PlayerRemoved {
            player,
            new_creator,
            new_captain,
        })
    }

    pub fn set_ready(&mut self, user_id: Uuid, ready: bool) -> DomainResult<bool> {
        let player = self
            .player_mut(user_id)
            .ok_or(DomainError::Unauthorized)?;
        player.ready = ready;
        Ok(player.ready)
    }

    // --- matchmaking and voting ---

    /// All ten seats filled and every player ready.
    pub fn ensure_can_matchmake(&self) -> DomainResult<()> {
        if self.players.len() < MAX_PLAYERS {
            return Err(DomainError::MissingPlayers);
        }
        if !self.players.iter().all(|p| p.ready) {
            return Err(DomainError::NotReady);
        }
        Ok(())
    }

    pub fn begin_matchmaking(&mut self, options: Vec<MatchOption>) {
        self.options = options;
        self.votes.clear();
        self.selected_match_option = None;
        self.status = LobbyStatus::Matchmaking;
    }

    fn option(&self, option_number: u32) -> DomainResult<&MatchOption> {
        self.options
            .iter()
            .find(|o| o.option_number == option_number)
            .ok_or_else(|| {
                DomainError::InvalidPayload(format!("no match option {option_number}"))
            })
    }

    /// Toggle a vote on one option. Returns true if the vote now exists.
    pub fn toggle_vote(&mut self, user_id: Uuid, option_number: u32) -> DomainResult<bool> {
        if !self.voting.enabled {
            return Err(DomainError::InvalidState("voting is disabled".to_string()));
        }
        if self.status != LobbyStatus::Matchmaking {
            return Err(DomainError::InvalidState(
                "no match options are open for voting".to_string(),
            ));
        }
        self.require_player(user_id)?;
        self.option(option_number)?;

        if let Some(idx) = self
            .votes
            .iter()
            .position(|v| v.user_id == user_id && v.option_number == option_number)
        {
            self.votes.remove(idx);
            Ok(false)
        } else {
            self.votes.push(Vote {
                user_id,
                option_number,
            });
            Ok(true)
        }
    }

    pub fn votes_for(&self, option_number: u32) -> usize {
        self.votes
            .iter()
            .filter(|v| v.option_number == option_number)
            .count()
    }

    /// Option a captain may finalize under the configured mode, if any.
    pub fn finalizable_option(&self) -> Option<u32> {
        if !self.voting.enabled || self.status != LobbyStatus::Matchmaking {
            return None;
        }
        match self.voting.mode {
            VotingMode::Majority => self
                .options
                .iter()
                .map(|o| (o.option_number, self.votes_for(o.option_number)))
                .filter(|(_, count)| *count >= MAJORITY_THRESHOLD)
                .max_by_key(|(_, count)| *count)
                .map(|(n, _)| n),
            VotingMode::Unanimous => self.options.iter().map(|o| o.option_number).find(|n| {
                self.players
                    .iter()
                    .all(|p| self.votes.iter().any(|v| v.user_id == p.user_id && v.option_number == *n))
            }),
            VotingMode::CaptainOverride => None,
        }
    }

    pub fn voting_status(&self) -> VotingStatus {
        VotingStatus {
            enabled: self.voting.enabled,
            mode: self.voting.mode,
            deadline: self.voting.deadline,
            counts: self
                .options
                .iter()
                .map(|o| (o.option_number, self.votes_for(o.option_number)))
                .collect(),
            finalizable_option: self.finalizable_option(),
        }
    }

    /// Resolve voting. In captain-override mode any option may be forced;
    /// otherwise the winner under the configured mode is selected.
    pub fn end_voting(&mut self, force_option: Option<u32>) -> DomainResult<u32> {
        if self.status != LobbyStatus::Matchmaking {
            return Err(DomainError::InvalidState(
                "no match options are open for voting".to_string(),
            ));
        }
        let selected = match self.voting.mode {
            VotingMode::CaptainOverride => {
                force_option.ok_or_else(|| {
                    DomainError::InvalidPayload("an option number is required".to_string())
                })?
            }
            VotingMode::Majority | VotingMode::Unanimous => {
                let winner = self.finalizable_option().ok_or(DomainError::NotReady)?;
                if let Some(forced) = force_option {
                    if forced != winner {
                        return Err(DomainError::InvalidState(format!(
                            "option {forced} has not won the vote"
                        )));
                    }
                }
                winner
            }
        };
        Ok(selected)
    }

    /// Apply a match option: assign every player's team and role, clear
    /// votes, bootstrap captains and compute the broadcast stats.
    pub fn apply_option(&mut self, option_number: u32) -> DomainResult<TeamStats> {
        let option = self.option(option_number)?.clone();
        for assignment in &option.assignments {
            let player = self
                .player_mut(assignment.user_id)
                .ok_or_else(|| {
                    DomainError::InvalidState(format!(
                        "assigned user {} is not in the lobby",
                        assignment.user_id
                    ))
                })?;
            player.team = Some(assignment.team);
            player.role = Some(assignment.role);
        }
        self.votes.clear();
        self.selected_match_option = Some(option_number);
        self.status = LobbyStatus::TeamSelected;
        self.normalize_captains_on(Side::Blue);
        self.normalize_captains_on(Side::Red);
        self.team_stats()
    }

    /// Ensure the team has exactly one captain, preferring an existing flag
    /// and falling back to the lowest join order. Returns the user promoted,
    /// if the flag moved.
    fn normalize_captains_on(&mut self, team: Side) -> Option<Uuid> {
        let captains: Vec<Uuid> = self
            .players_on(team)
            .filter(|p| p.captain)
            .map(|p| p.user_id)
            .collect();
        if captains.len() == 1 {
            return None;
        }
        let keep = if captains.is_empty() {
            self.players_on(team).min_by_key(|p| p.join_order)?.user_id
        } else {
            // Two captains can only result from a swap; keep the senior one.
            let mut seniors: Vec<&LobbyPlayer> = self
                .players_on(team)
                .filter(|p| captains.contains(&p.user_id))
                .collect();
            seniors.sort_by_key(|p| p.join_order);
            seniors[0].user_id
        };
        for player in self.players.iter_mut().filter(|p| p.team == Some(team)) {
            player.captain = player.user_id == keep;
        }
        Some(keep)
    }

    /// Per-lane and aggregate stats for the currently assigned teams, using
    /// the selected option's role MMR/comfort figures.
    pub fn team_stats(&self) -> DomainResult<TeamStats> {
        let selected = self
            .selected_match_option
            .ok_or_else(|| DomainError::InvalidState("no option selected".to_string()))?;
        let option = self.option(selected)?;

        let figures = |user_id: Uuid| -> (i32, f64) {
            option
                .assignments
                .iter()
                .find(|a| a.user_id == user_id)
                .map(|a| (a.role_mmr, a.comfort))
                .unwrap_or((1200, 0.5))
        };

        let mut blue_mmr = Vec::new();
        let mut red_mmr = Vec::new();
        let mut blue_comfort = Vec::new();
        let mut red_comfort = Vec::new();
        for player in &self.players {
            let (mmr, comfort) = figures(player.user_id);
            match player.team {
                Some(Side::Blue) => {
                    blue_mmr.push(mmr);
                    blue_comfort.push(comfort);
                }
                Some(Side::Red) => {
                    red_mmr.push(mmr);
                    red_comfort.push(comfort);
                }
                None => {}
            }
        }
        let avg_i = |v: &[i32]| {
            if v.is_empty() {
                0.0
            } else {
                v.iter().sum::<i32>() as f64 / v.len() as f64
            }
        };
        let avg_f = |v: &[f64]| {
            if v.is_empty() {
                0.0
            } else {
                v.iter().sum::<f64>() / v.len() as f64
            }
        };

        let lane_diffs = Role::ALL
            .iter()
            .filter_map(|role| {
                let blue = self
                    .players
                    .iter()
                    .find(|p| p.team == Some(Side::Blue) && p.role == Some(*role))?;
                let red = self
                    .players
                    .iter()
                    .find(|p| p.team == Some(Side::Red) && p.role == Some(*role))?;
                Some(LaneDiff {
                    role: *role,
                    diff: (figures(blue.user_id).0 - figures(red.user_id).0).abs(),
                })
            })
            .collect();

        let blue_avg_mmr = avg_i(&blue_mmr);
        let red_avg_mmr = avg_i(&red_mmr);
        Ok(TeamStats {
            blue_avg_mmr,
            red_avg_mmr,
            mmr_difference: (blue_avg_mmr - red_avg_mmr).abs(),
            blue_avg_comfort: avg_f(&blue_comfort),
            red_avg_comfort: avg_f(&red_comfort),
            lane_diffs,
        })
    }

    // --- captaincy and moderation ---

    /// Unilaterally claim the caller's team captaincy.
    pub fn take_captain(&mut self, user_id: Uuid) -> DomainResult<CaptainChange> {
        let team = self
            .side_of(user_id)
            .ok_or(DomainError::InvalidState("no team assigned yet".to_string()))?;
        let previous = self.captain_of(team).map(|p| p.user_id);
        for player in self.players.iter_mut().filter(|p| p.team == Some(team)) {
            player.captain = player.user_id == user_id;
        }
        Ok(CaptainChange {
            team,
            user_id,
            previous,
        })
    }

    /// Captain hands the flag to a teammate. Direct action, no approval.
    pub fn promote_captain(&mut self, caller: Uuid, target: Uuid) -> DomainResult<CaptainChange> {
        let team = self.require_captain_team(caller)?;
        let target_player = self.require_player(target)?;
        if target_player.team != Some(team) {
            return Err(DomainError::Unauthorized);
        }
        for player in self.players.iter_mut().filter(|p| p.team == Some(team)) {
            player.captain = player.user_id == target;
        }
        Ok(CaptainChange {
            team,
            user_id: target,
            previous: Some(caller),
        })
    }

    /// Captain removes a teammate. Direct action, no approval.
    pub fn kick(&mut self, caller: Uuid, target: Uuid) -> DomainResult<PlayerRemoved> {
        if caller == target {
            return Err(DomainError::InvalidPayload(
                "cannot kick yourself".to_string(),
            ));
        }
        let team = self.require_captain_team(caller)?;
        let target_player = self.require_player(target)?;
        if target_player.team != Some(team) {
            return Err(DomainError::Unauthorized);
        }
        self.remove_player(target)
    }

    fn require_captain_team(&self, user_id: Uuid) -> DomainResult<Side> {
        let player = self.require_player(user_id)?;
        if !player.captain {
            return Err(DomainError::Unauthorized);
        }
        player.team.ok_or(DomainError::Unauthorized)
    }

    // --- swaps ---

    /// Swap two players across teams, preserving their roles.
    pub fn swap_players(&mut self, a: Uuid, b: Uuid) -> DomainResult<()> {
        let team_a = self
            .side_of(a)
            .ok_or_else(|| DomainError::InvalidState("player has no team".to_string()))?;
        let team_b = self
            .side_of(b)
            .ok_or_else(|| DomainError::InvalidState("player has no team".to_string()))?;
        if team_a == team_b {
            return Err(DomainError::InvalidPayload(
                "players are on the same team".to_string(),
            ));
        }
        self.player_mut(a).expect("validated").team = Some(team_b);
        self.player_mut(b).expect("validated").team = Some(team_a);
        self.normalize_captains_on(Side::Blue);
        self.normalize_captains_on(Side::Red);
        Ok(())
    }

    /// Swap the assigned roles of two same-team players.
    pub fn swap_roles(&mut self, a: Uuid, b: Uuid) -> DomainResult<()> {
        let (team_a, role_a) = {
            let p = self.require_player(a)?;
            (p.team, p.role)
        };
        let (team_b, role_b) = {
            let p = self.require_player(b)?;
            (p.team, p.role)
        };
        if team_a.is_none() || team_a != team_b {
            return Err(DomainError::InvalidPayload(
                "players are not on the same team".to_string(),
            ));
        }
        let (role_a, role_b) = match (role_a, role_b) {
            (Some(ra), Some(rb)) => (ra, rb),
            _ => {
                return Err(DomainError::InvalidState(
                    "both players need an assigned role".to_string(),
                ))
            }
        };
        self.player_mut(a).expect("validated").role = Some(role_b);
        self.player_mut(b).expect("validated").role = Some(role_a);
        Ok(())
    }

    // --- pending-action arbiter ---

    /// Create a joint action. Fails while another action is pending; the
    /// proposer's side is pre-approved.
    pub fn propose_action(
        &mut self,
        caller: Uuid,
        action: ActionType,
        target_player_ids: Vec<Uuid>,
        option_number: Option<u32>,
    ) -> DomainResult<PendingAction> {
        if self.pending_action.is_some() {
            return Err(DomainError::ActionPending);
        }
        let side = self.require_captain_team(caller)?;
        match action {
            ActionType::SelectOption => {
                let n = option_number.ok_or_else(|| {
                    DomainError::InvalidPayload("option number is required".to_string())
                })?;
                self.option(n)?;
            }
            ActionType::SwapPlayers | ActionType::SwapRoles => {
                if target_player_ids.len() != 2 {
                    return Err(DomainError::InvalidPayload(
                        "two target players are required".to_string(),
                    ));
                }
            }
            ActionType::StartDraft => {
                if self.status != LobbyStatus::TeamSelected {
                    return Err(DomainError::InvalidState(
                        "teams have not been selected".to_string(),
                    ));
                }
            }
            ActionType::Matchmake => {}
            ActionType::PromoteCaptain | ActionType::Kick => {
                // Moderation actions are direct and never arbitered.
                return Err(DomainError::InvalidPayload(format!(
                    "{action} does not require approval"
                )));
            }
        }
        let pending = PendingAction::new(action, caller, side, target_player_ids, option_number);
        self.pending_action = Some(pending.clone());
        Ok(pending)
    }

    /// Record the caller's approval. Returns the action once both captains
    /// agree so the session can run its execute hook.
    pub fn approve_action(
        &mut self,
        caller: Uuid,
        action_id: Uuid,
    ) -> DomainResult<Option<PendingAction>> {
        let side = self.require_captain_team(caller)?;
        let pending = self.pending_action.as_mut().ok_or(DomainError::NoAction)?;
        if pending.id != action_id {
            return Err(DomainError::NoAction);
        }
        if pending.is_expired(Utc::now()) {
            return Err(DomainError::InvalidState("action has expired".to_string()));
        }
        if pending.approve(side)? {
            Ok(Some(pending.clone()))
        } else {
            Ok(None)
        }
    }

    /// Mark the pending action executed and clear it.
    pub fn mark_action_executed(&mut self, action_id: Uuid) -> DomainResult<PendingAction> {
        match self.pending_action.take() {
            Some(mut action) if action.id == action_id => {
                action.status = ActionStatus::Executed;
                Ok(action)
            }
            other => {
                self.pending_action = other;
                Err(DomainError::NoAction)
            }
        }
    }

    /// Either captain (or the proposer) withdraws the action.
    pub fn cancel_action(&mut self, caller: Uuid, action_id: Uuid) -> DomainResult<PendingAction> {
        let authorized = self.is_captain(caller)
            || self
                .pending_action
                .as_ref()
                .map(|a| a.proposer_user_id == caller)
                .unwrap_or(false);
        if !authorized {
            return Err(DomainError::Unauthorized);
        }
        match self.pending_action.take() {
            Some(mut action) if action.id == action_id => {
                action.status = ActionStatus::Cancelled;
                Ok(action)
            }
            other => {
                self.pending_action = other;
                Err(DomainError::NoAction)
            }
        }
    }

    /// Drop the pending action if its expiry has passed; used by the
    /// background sweeper.
    pub fn sweep_expired_action(&mut self, now: DateTime<Utc>) -> Option<PendingAction> {
        if self
            .pending_action
            .as_ref()
            .map(|a| a.is_expired(now))
            .unwrap_or(false)
        {
            let mut action = self.pending_action.take().expect("checked");
            action.status = ActionStatus::Expired;
            return Some(action);
        }
        None
    }

    // --- draft hand-off ---

    pub fn attach_room(&mut self, room_id: Uuid, room_short_code: String) {
        self.room_id = Some(room_id);
        self.room_short_code = Some(room_short_code);
        self.status = LobbyStatus::Drafting;
    }
}
