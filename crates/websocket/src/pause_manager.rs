use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use uuid::Uuid;

use domain::errors::{DomainError, DomainResult};
use domain::models::draft::Side;
use domain::models::pause::{PauseState, AUTO_RESUME_SECS};

use crate::draft_room::RoomRequest;

/// Length of the resume countdown once both captains are ready.
pub const RESUME_COUNTDOWN_SECS: u8 = 5;

/// Result of a resume-ready change, so the event loop knows what to
/// broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeReadyOutcome {
    Updated,
    CountdownStarted,
    CountdownCancelled { cancelled_by: Side },
}

/// Owns the pause lifecycle of one draft room: the auto-resume deadline and
/// the resume countdown. Auxiliary tasks never touch state; they enqueue
/// synthetic requests tagged with the pause generation, and the loop hands
/// them back here where stale generations are discarded.
pub struct PauseManager {
    state: PauseState,
    generation: u64,
    deadline_task: Option<JoinHandle<()>>,
    countdown_task: Option<JoinHandle<()>>,
    requests: mpsc::Sender<RoomRequest>,
}

impl PauseManager {
    pub fn new(requests: mpsc::Sender<RoomRequest>) -> Self {
        Self {
            state: PauseState::default(),
            generation: 0,
            deadline_task: None,
            countdown_task: None,
            requests,
        }
    }

    pub fn state(&self) -> &PauseState {
        &self.state
    }

    pub fn is_paused(&self) -> bool {
        self.state.is_paused
    }

    /// True if a synthetic request belongs to the current pause.
    pub fn is_current(&self, pause_generation: u64) -> bool {
        self.state.is_paused && self.generation == pause_generation
    }

    /// Freeze the room. The caller has already frozen the timer and checked
    /// the preconditions.
    pub fn pause(&mut self, by: Uuid, side: Side, frozen_remaining_ms: u64) -> &PauseState {
        self.generation += 1;
        self.state.pause(by, side, frozen_remaining_ms);

        let generation = self.generation;
        let requests = self.requests.clone();
        self.deadline_task = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(AUTO_RESUME_SECS as u64)).await;
            let _ = requests
                .send(RoomRequest::PauseDeadline {
                    pause_generation: generation,
                })
                .await;
        }));
        &self.state
    }

    /// Flip one side's resume-ready flag. Starting the countdown requires
    /// both flags; any un-ready during a countdown cancels it and clears
    /// both flags.
    pub fn set_resume_ready(
        &mut self,
        side: Side,
        ready: bool,
    ) -> DomainResult<ResumeReadyOutcome> {
        if !self.state.is_paused {
            return Err(DomainError::NotPaused);
        }
        self.state.set_resume_ready(side, ready);

        if !ready {
            if self.countdown_task.is_some() {
                self.cancel_countdown();
                self.state.set_resume_ready(Side::Blue, false);
                self.state.set_resume_ready(Side::Red, false);
                self.state.countdown_seconds = 0;
                return Ok(ResumeReadyOutcome::CountdownCancelled { cancelled_by: side });
            }
            return Ok(ResumeReadyOutcome::Updated);
        }

        if self.state.both_resume_ready() && self.countdown_task.is_none() {
            self.start_countdown();
            return Ok(ResumeReadyOutcome::CountdownStarted);
        }
        Ok(ResumeReadyOutcome::Updated)
    }

    fn start_countdown(&mut self) {
        let generation = self.generation;
        let requests = self.requests.clone();
        self.state.countdown_seconds = RESUME_COUNTDOWN_SECS;
        self.countdown_task = Some(tokio::spawn(async move {
            for seconds in (1..=RESUME_COUNTDOWN_SECS).rev() {
                let _ = requests
                    .send(RoomRequest::ResumeCountdownTick {
                        pause_generation: generation,
                        seconds,
                    })
                    .await;
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            let _ = requests
                .send(RoomRequest::ResumeCountdownComplete {
                    pause_generation: generation,
                })
                .await;
        }));
    }

    fn cancel_countdown(&mut self) {
        if let Some(task) = self.countdown_task.take() {
            task.abort();
        }
    }

    /// Record a countdown tick delivered through the event loop.
    pub fn note_countdown_tick(&mut self, seconds: u8) {
        self.state.countdown_seconds = seconds;
    }

    /// Clear the pause (countdown completion or deadline), invalidating any
    /// in-flight tasks. Returns the frozen timer remaining. Idempotent with
    /// respect to racing resume paths via the generation check upstream.
    pub fn resume(&mut self) -> DomainResult<u64> {
        if !self.state.is_paused {
            return Err(DomainError::NotPaused);
        }
        self.generation += 1;
        self.cancel_countdown();
        if let Some(task) = self.deadline_task.take() {
            task.abort();
        }
        Ok(self.state.clear())
    }
}

impl Drop for PauseManager {
    fn drop(&mut self) {
        self.cancel_countdown();
        if let Some(task) = self.deadline_task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (PauseManager, mpsc::Receiver<RoomRequest>) {
        let (tx, rx) = mpsc::channel(32);
        (PauseManager::new(tx), rx)
    }

    #[tokio::test]
    async fn test_resume_ready_requires_pause() {
        let (mut mgr, _rx) = manager();
        assert_eq!(
            mgr.set_resume_ready(Side::Blue, true),
            Err(DomainError::NotPaused)
        );
    }

    #[tokio::test]
    async fn test_countdown_starts_when_both_ready() {
        let (mut mgr, _rx) = manager();
        mgr.pause(Uuid::new_v4(), Side::Blue, 10_000);

        assert_eq!(
            mgr.set_resume_ready(Side::Blue, true).unwrap(),
            ResumeReadyOutcome::Updated
        );
        assert_eq!(
            mgr.set_resume_ready(Side::Red, true).unwrap(),
            ResumeReadyOutcome::CountdownStarted
        );
        // Re-readying during the countdown changes nothing.
        assert_eq!(
            mgr.set_resume_ready(Side::Red, true).unwrap(),
            ResumeReadyOutcome::Updated
        );
    }

    #[tokio::test]
    async fn test_unready_cancels_countdown_and_clears_flags() {
        let (mut mgr, _rx) = manager();
        mgr.pause(Uuid::new_v4(), Side::Blue, 10_000);
        mgr.set_resume_ready(Side::Blue, true).unwrap();
        mgr.set_resume_ready(Side::Red, true).unwrap();

        let outcome = mgr.set_resume_ready(Side::Red, false).unwrap();
        assert_eq!(
            outcome,
            ResumeReadyOutcome::CountdownCancelled {
                cancelled_by: Side::Red
            }
        );
        assert!(!mgr.state().blue_resume_ready);
        assert!(!mgr.state().red_resume_ready);
        assert_eq!(mgr.state().countdown_seconds, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_ticks_then_completes() {
        let (mut mgr, mut rx) = manager();
        mgr.pause(Uuid::new_v4(), Side::Blue, 10_000);
        mgr.set_resume_ready(Side::Blue, true).unwrap();
        mgr.set_resume_ready(Side::Red, true).unwrap();

        let mut seconds_seen = Vec::new();
        loop {
            match rx.recv().await.unwrap() {
                RoomRequest::ResumeCountdownTick { seconds, .. } => seconds_seen.push(seconds),
                RoomRequest::ResumeCountdownComplete { pause_generation } => {
                    assert!(mgr.is_current(pause_generation));
                    break;
                }
                other => panic!("unexpected request: {other:?}"),
            }
        }
        assert_eq!(seconds_seen, vec![5, 4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn test_resume_clears_and_invalidates() {
        let (mut mgr, _rx) = manager();
        mgr.pause(Uuid::new_v4(), Side::Red, 4_200);
        let generation_before = mgr.generation;

        let frozen = mgr.resume().unwrap();
        assert_eq!(frozen, 4_200);
        assert!(!mgr.is_paused());
        // The old deadline's generation no longer matches.
        assert!(!mgr.is_current(generation_before));
        assert_eq!(mgr.resume(), Err(DomainError::NotPaused));
    }
}
