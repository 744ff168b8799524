use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, DomainResult};
use crate::models::pending_edit::EditSlot;

/// Sentinel champion id recorded when a ban is skipped (or a pick could not
/// be auto-filled). It never counts toward availability checks.
pub const NO_CHAMPION: &str = "None";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Blue,
    Red,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Blue => Side::Red,
            Side::Red => Side::Blue,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Blue => write!(f, "blue"),
            Side::Red => write!(f, "red"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseAction {
    Ban,
    Pick,
}

impl std::fmt::Display for PhaseAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhaseAction::Ban => write!(f, "ban"),
            PhaseAction::Pick => write!(f, "pick"),
        }
    }
}

/// One step of the fixed ban/pick sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub team: Side,
    pub action: PhaseAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftMode {
    ProPlay,
    Fearless,
}

const B: Side = Side::Blue;
const R: Side = Side::Red;

macro_rules! phase {
    ($team:expr, $action:ident) => {
        Phase {
            team: $team,
            action: PhaseAction::$action,
        }
    };
}

/// The canonical 20-phase tournament sequence: six bans, six picks, four
/// bans, four picks. Fearless mode reuses the same sequence; the carried-over
/// bans only restrict availability.
const PRO_PLAY_PHASES: [Phase; 20] = [
    // First ban phase
    phase!(B, Ban),
    phase!(R, Ban),
    phase!(B, Ban),
    phase!(R, Ban),
    phase!(B, Ban),
    phase!(R, Ban),
    // First pick phase
    phase!(B, Pick),
    phase!(R, Pick),
    phase!(R, Pick),
    phase!(B, Pick),
    phase!(B, Pick),
    phase!(R, Pick),
    // Second ban phase
    phase!(R, Ban),
    phase!(B, Ban),
    phase!(R, Ban),
    phase!(B, Ban),
    // Second pick phase
    phase!(R, Pick),
    phase!(B, Pick),
    phase!(B, Pick),
    phase!(R, Pick),
];

pub fn phase_sequence(mode: DraftMode) -> &'static [Phase] {
    match mode {
        DraftMode::ProPlay | DraftMode::Fearless => &PRO_PLAY_PHASES,
    }
}

/// The four result lists of a finished (or in-flight) draft, as handed to
/// persistence hooks and broadcast on completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftResult {
    pub blue_bans: Vec<String>,
    pub red_bans: Vec<String>,
    pub blue_picks: Vec<String>,
    pub red_picks: Vec<String>,
}

/// A committed phase outcome, reported back to the event loop so it can
/// broadcast and decide whether to restart the timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedPhase {
    pub phase_index: usize,
    pub phase: Phase,
    pub champion_id: String,
    pub next_phase: Option<Phase>,
    pub is_complete: bool,
}

/// Authoritative ban/pick state of one draft room.
///
/// Pure state machine: every mutation happens through the owning room's
/// event loop, so no interior locking is needed here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftState {
    pub mode: DraftMode,
    pub phase_index: usize,
    pub blue_bans: Vec<String>,
    pub red_bans: Vec<String>,
    pub blue_picks: Vec<String>,
    pub red_picks: Vec<String>,
    /// Bans carried over from earlier games of a fearless series. Supplied
    /// at room creation; enforced by availability checks only.
    pub fearless_bans: Vec<String>,
    pub started: bool,
    pub blue_ready: bool,
    pub red_ready: bool,
    pub blue_hover: Option<String>,
    pub red_hover: Option<String>,
}

impl DraftState {
    pub fn new(mode: DraftMode, fearless_bans: Vec<String>) -> Self {
        Self {
            mode,
            phase_index: 0,
            blue_bans: Vec::new(),
            red_bans: Vec::new(),
            blue_picks: Vec::new(),
            red_picks: Vec::new(),
            fearless_bans,
            started: false,
            blue_ready: false,
            red_ready: false,
            blue_hover: None,
            red_hover: None,
        }
    }

    pub fn total_phases(&self) -> usize {
        phase_sequence(self.mode).len()
    }

    pub fn is_complete(&self) -> bool {
        self.phase_index == self.total_phases()
    }

    pub fn current_phase(&self) -> Option<Phase> {
        phase_sequence(self.mode).get(self.phase_index).copied()
    }

    pub fn ready(&self, side: Side) -> bool {
        match side {
            Side::Blue => self.blue_ready,
            Side::Red => self.red_ready,
        }
    }

    pub fn set_ready(&mut self, side: Side, ready: bool) {
        match side {
            Side::Blue => self.blue_ready = ready,
            Side::Red => self.red_ready = ready,
        }
    }

    pub fn hover(&self, side: Side) -> Option<&str> {
        match side {
            Side::Blue => self.blue_hover.as_deref(),
            Side::Red => self.red_hover.as_deref(),
        }
    }

    pub fn set_hover(&mut self, side: Side, champion_id: Option<String>) {
        match side {
            Side::Blue => self.blue_hover = champion_id,
            Side::Red => self.red_hover = champion_id,
        }
    }

    pub fn start(&mut self) -> DomainResult<()> {
        if self.started {
            return Err(DomainError::AlreadyStarted);
        }
        if !(self.blue_ready && self.red_ready) {
            return Err(DomainError::NotReady);
        }
        self.started = true;
        Ok(())
    }

    fn list(&self, action: PhaseAction, team: Side) -> &Vec<String> {
        match (action, team) {
            (PhaseAction::Ban, Side::Blue) => &self.blue_bans,
            (PhaseAction::Ban, Side::Red) => &self.red_bans,
            (PhaseAction::Pick, Side::Blue) => &self.blue_picks,
            (PhaseAction::Pick, Side::Red) => &self.red_picks,
        }
    }

    fn list_mut(&mut self, action: PhaseAction, team: Side) -> &mut Vec<String> {
        match (action, team) {
            (PhaseAction::Ban, Side::Blue) => &mut self.blue_bans,
            (PhaseAction::Ban, Side::Red) => &mut self.red_bans,
            (PhaseAction::Pick, Side::Blue) => &mut self.blue_picks,
            (PhaseAction::Pick, Side::Red) => &mut self.red_picks,
        }
    }

    /// True if the champion already occupies a slot in any of the four
    /// lists. The `"None"` sentinel never occupies a slot.
    pub fn champion_in_use(&self, champion_id: &str) -> bool {
        if champion_id == NO_CHAMPION {
            return false;
        }
        self.blue_bans.iter().any(|c| c == champion_id)
            || self.red_bans.iter().any(|c| c == champion_id)
            || self.blue_picks.iter().any(|c| c == champion_id)
            || self.red_picks.iter().any(|c| c == champion_id)
    }

    /// Availability for hovering/locking: not already drafted and not
    /// excluded by carried-over fearless bans.
    pub fn validate_available(&self, champion_id: &str) -> DomainResult<()> {
        if champion_id == NO_CHAMPION {
            return Ok(());
        }
        if self.champion_in_use(champion_id) || self.fearless_bans.iter().any(|c| c == champion_id)
        {
            return Err(DomainError::ChampionUnavailable(champion_id.to_string()));
        }
        Ok(())
    }

    /// Commit a champion as the current phase's outcome and advance. Clears
    /// both hovers; the caller broadcasts and restarts the timer.
    pub fn commit_current(&mut self, champion_id: String) -> DomainResult<CommittedPhase> {
        if !self.started {
            return Err(DomainError::InvalidState("draft has not started".to_string()));
        }
        let phase = self
            .current_phase()
            .ok_or_else(|| DomainError::InvalidState("draft is already complete".to_string()))?;
        self.validate_available(&champion_id)?;

        let phase_index = self.phase_index;
        self.list_mut(phase.action, phase.team).push(champion_id.clone());
        self.phase_index += 1;
        self.blue_hover = None;
        self.red_hover = None;

        Ok(CommittedPhase {
            phase_index,
            phase,
            champion_id,
            next_phase: self.current_phase(),
            is_complete: self.is_complete(),
        })
    }

    /// Champion currently occupying a slot, for edit validation.
    pub fn slot_champion(&self, slot: &EditSlot) -> DomainResult<String> {
        self.list(slot.kind, slot.team)
            .get(slot.index)
            .cloned()
            .ok_or_else(|| {
                DomainError::InvalidSlot(format!(
                    "{} {} slot {}",
                    slot.team, slot.kind, slot.index
                ))
            })
    }

    /// Replace a past slot's champion in place (pause-time edit). The new
    /// champion may equal the slot's current occupant but no other slot's.
    pub fn apply_edit(&mut self, slot: &EditSlot, champion_id: &str) -> DomainResult<String> {
        let old = self.slot_champion(slot)?;
        self.validate_edit_target(slot, champion_id)?;
        self.list_mut(slot.kind, slot.team)[slot.index] = champion_id.to_string();
        Ok(old)
    }

    /// Edit-specific availability: the new champion must not occupy any slot
    /// other than the one being edited.
    pub fn validate_edit_target(&self, slot: &EditSlot, champion_id: &str) -> DomainResult<()> {
        if champion_id == NO_CHAMPION {
            return Ok(());
        }
        if self.fearless_bans.iter().any(|c| c == champion_id) {
            return Err(DomainError::ChampionUnavailable(champion_id.to_string()));
        }
        let occupied_elsewhere = [
            (PhaseAction::Ban, Side::Blue),
            (PhaseAction::Ban, Side::Red),
            (PhaseAction::Pick, Side::Blue),
            (PhaseAction::Pick, Side::Red),
        ]
        .into_iter()
        .any(|(action, team)| {
            self.list(action, team).iter().enumerate().any(|(i, c)| {
                c == champion_id && !(action == slot.kind && team == slot.team && i == slot.index)
            })
        });
        if occupied_elsewhere {
            return Err(DomainError::ChampionUnavailable(champion_id.to_string()));
        }
        Ok(())
    }

    pub fn result(&self) -> DraftResult {
        DraftResult {
            blue_bans: self.blue_bans.clone(),
            red_bans: self.red_bans.clone(),
            blue_picks: self.blue_picks.clone(),
            red_picks: self.red_picks.clone(),
        }
    }

    /// Count of committed outcomes across all four lists.
    pub fn committed_count(&self) -> usize {
        self.blue_bans.len() + self.red_bans.len() + self.blue_picks.len() + self.red_picks.len()
    }
}
