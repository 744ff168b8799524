use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::draft::Side;

/// A paused draft auto-resumes after this long.
pub const AUTO_RESUME_SECS: i64 = 300;

/// Pause lifecycle for one draft room. Mutated only by the owning room's
/// event loop; countdown/deadline tasks feed it synthetic requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseState {
    pub is_paused: bool,
    pub paused_by: Option<Uuid>,
    pub paused_by_side: Option<Side>,
    /// Timer remaining captured at the pause instant, restored on resume.
    pub frozen_remaining_ms: u64,
    pub auto_resume_at: Option<DateTime<Utc>>,
    pub blue_resume_ready: bool,
    pub red_resume_ready: bool,
    /// Seconds left on the resume countdown; 0 when no countdown runs.
    pub countdown_seconds: u8,
}

impl PauseState {
    pub fn pause(&mut self, by: Uuid, side: Side, frozen_remaining_ms: u64) {
        self.is_paused = true;
        self.paused_by = Some(by);
        self.paused_by_side = Some(side);
        self.frozen_remaining_ms = frozen_remaining_ms;
        self.auto_resume_at = Some(Utc::now() + Duration::seconds(AUTO_RESUME_SECS));
        self.blue_resume_ready = false;
        self.red_resume_ready = false;
        self.countdown_seconds = 0;
    }

    pub fn resume_ready(&self, side: Side) -> bool {
        match side {
            Side::Blue => self.blue_resume_ready,
            Side::Red => self.red_resume_ready,
        }
    }

    pub fn set_resume_ready(&mut self, side: Side, ready: bool) {
        match side {
            Side::Blue => self.blue_resume_ready = ready,
            Side::Red => self.red_resume_ready = ready,
        }
    }

    pub fn both_resume_ready(&self) -> bool {
        self.blue_resume_ready && self.red_resume_ready
    }

    /// Clear everything back to the unpaused state, returning the frozen
    /// remaining so the timer can be restarted from it.
    pub fn clear(&mut self) -> u64 {
        let frozen = self.frozen_remaining_ms;
        *self = PauseState::default();
        frozen
    }
}
