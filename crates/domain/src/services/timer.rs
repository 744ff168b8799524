use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tracing::debug;

/// Grace window after the displayed countdown reaches zero during which the
/// active side may still lock in.
pub const BUFFER_MS: u64 = 5_000;

/// Receiver for timer output. Tick delivery may mutate nothing; expiry is
/// expected to enqueue a synthetic request into the owning event loop,
/// carrying the generation so stale firings can be discarded.
pub trait TimerSink: Send + Sync + 'static {
    fn on_tick(&self, remaining_ms: u64, in_buffer: bool);
    fn on_expired(&self, generation: u64);
}

struct Running {
    duration_ms: u64,
    started_at: Instant,
    task: JoinHandle<()>,
}

/// Per-phase countdown for one draft room.
///
/// `start(d)` runs for `d + BUFFER_MS`: a 1 Hz ticker reports the remaining
/// display time (floored at zero, with the buffer flag once past `d`) and
/// the expiry fires exactly once at the end of the buffer. Every `start` /
/// `stop` / `pause` bumps the generation, invalidating any expiry already in
/// flight from a previous countdown.
pub struct PhaseTimer {
    sink: Arc<dyn TimerSink>,
    buffer_ms: u64,
    generation: AtomicU64,
    running: Mutex<Option<Running>>,
}

impl PhaseTimer {
    pub fn new(sink: Arc<dyn TimerSink>) -> Self {
        Self {
            sink,
            buffer_ms: BUFFER_MS,
            generation: AtomicU64::new(0),
            running: Mutex::new(None),
        }
    }

    #[cfg(test)]
    fn with_buffer(sink: Arc<dyn TimerSink>, buffer_ms: u64) -> Self {
        Self {
            sink,
            buffer_ms,
            generation: AtomicU64::new(0),
            running: Mutex::new(None),
        }
    }

    /// Begin a fresh countdown, cancelling any previous one.
    pub fn start(&self, duration_ms: u64) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let started_at = Instant::now();
        let sink = Arc::clone(&self.sink);
        let buffer_ms = self.buffer_ms;

        let task = tokio::spawn(async move {
            // Immediate tick so clients render the full phase duration.
            sink.on_tick(duration_ms, false);
            let mut ticker = interval(Duration::from_secs(1));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let elapsed = started_at.elapsed().as_millis() as u64;
                if elapsed >= duration_ms + buffer_ms {
                    debug!(generation, "phase timer expired");
                    sink.on_expired(generation);
                    break;
                }
                sink.on_tick(duration_ms.saturating_sub(elapsed), elapsed > duration_ms);
            }
        });

        let mut slot = self.running.lock().expect("timer lock");
        if let Some(previous) = slot.replace(Running {
            duration_ms,
            started_at,
            task,
        }) {
            previous.task.abort();
        }
    }

    /// Cancel the countdown and ticker. Idempotent.
    pub fn stop(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(running) = self.running.lock().expect("timer lock").take() {
            running.task.abort();
        }
    }

    /// Freeze the countdown, returning the remaining display time (floored
    /// at zero). A paused timer emits no ticks.
    pub fn pause(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst);
        match self.running.lock().expect("timer lock").take() {
            Some(running) => {
                running.task.abort();
                let elapsed = running.started_at.elapsed().as_millis() as u64;
                running.duration_ms.saturating_sub(elapsed)
            }
            None => 0,
        }
    }

    /// Restart from a previously frozen remaining time.
    pub fn resume(&self, frozen_ms: u64) {
        self.start(frozen_ms);
    }

    /// Remaining display time right now; 0 when stopped or in the buffer.
    pub fn remaining_ms(&self) -> u64 {
        self.running
            .lock()
            .expect("timer lock")
            .as_ref()
            .map(|r| {
                r.duration_ms
                    .saturating_sub(r.started_at.elapsed().as_millis() as u64)
            })
            .unwrap_or(0)
    }

    pub fn in_buffer(&self) -> bool {
        self.running
            .lock()
            .expect("timer lock")
            .as_ref()
            .map(|r| r.started_at.elapsed().as_millis() as u64 > r.duration_ms)
            .unwrap_or(false)
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().expect("timer lock").is_some()
    }

    /// Generation of the most recent start/stop/pause. An expiry whose
    /// generation differs is stale and must be ignored.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

impl Drop for PhaseTimer {
    fn drop(&mut self) {
        if let Some(running) = self.running.lock().expect("timer lock").take() {
            running.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        ticks: Mutex<Vec<(u64, bool)>>,
        expirations: Mutex<Vec<u64>>,
    }

    impl TimerSink for RecordingSink {
        fn on_tick(&self, remaining_ms: u64, in_buffer: bool) {
            self.ticks.lock().unwrap().push((remaining_ms, in_buffer));
        }

        fn on_expired(&self, generation: u64) {
            self.expirations.lock().unwrap().push(generation);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_sequence_buffer_and_expiry() {
        let sink = Arc::new(RecordingSink::default());
        let timer = PhaseTimer::new(sink.clone());

        timer.start(3_000);
        tokio::time::sleep(Duration::from_millis(9_000)).await;

        let ticks = sink.ticks.lock().unwrap().clone();
        assert_eq!(ticks[0], (3_000, false));
        assert!(ticks.contains(&(2_000, false)));
        assert!(ticks.contains(&(1_000, false)));
        // Past the duration the display floors at zero with the buffer flag.
        assert!(ticks.contains(&(0, true)));
        assert!(ticks.iter().all(|(remaining, _)| *remaining <= 3_000));

        let expirations = sink.expirations.lock().unwrap().clone();
        assert_eq!(expirations, vec![timer.generation()]);

        // No further activity after expiry.
        let tick_count = sink.ticks.lock().unwrap().len();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(sink.ticks.lock().unwrap().len(), tick_count);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_freezes_remaining() {
        let sink = Arc::new(RecordingSink::default());
        let timer = PhaseTimer::new(sink.clone());

        timer.start(10_000);
        tokio::time::sleep(Duration::from_millis(3_000)).await;
        let frozen = timer.pause();
        assert_eq!(frozen, 7_000);
        assert!(!timer.is_running());

        // A paused timer emits nothing.
        let tick_count = sink.ticks.lock().unwrap().len();
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(sink.ticks.lock().unwrap().len(), tick_count);
        assert!(sink.expirations.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_past_duration_freezes_at_zero() {
        let sink = Arc::new(RecordingSink::default());
        let timer = PhaseTimer::new(sink.clone());

        timer.start(2_000);
        tokio::time::sleep(Duration::from_millis(2_001)).await;
        assert_eq!(timer.pause(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent_and_silences_expiry() {
        let sink = Arc::new(RecordingSink::default());
        let timer = PhaseTimer::new(sink.clone());

        timer.start(1_000);
        timer.stop();
        timer.stop();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(sink.expirations.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_invalidates_previous_generation() {
        let sink = Arc::new(RecordingSink::default());
        let timer = PhaseTimer::new(sink.clone());

        timer.start(1_000);
        let first_generation = timer.generation();
        timer.start(30_000);
        assert!(timer.generation() > first_generation);

        tokio::time::sleep(Duration::from_secs(3)).await;
        // The first countdown was cancelled before it could expire.
        assert!(sink.expirations.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_behaves_like_start() {
        let sink = Arc::new(RecordingSink::default());
        let timer = PhaseTimer::with_buffer(sink.clone(), 1_000);

        timer.start(10_000);
        tokio::time::sleep(Duration::from_millis(4_000)).await;
        let frozen = timer.pause();
        assert_eq!(frozen, 6_000);

        timer.resume(frozen);
        tokio::time::sleep(Duration::from_millis(7_500)).await;
        let expirations = sink.expirations.lock().unwrap().clone();
        assert_eq!(expirations.len(), 1);
    }
}
