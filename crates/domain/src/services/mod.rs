pub mod timer;

pub use timer::{PhaseTimer, TimerSink, BUFFER_MS};
