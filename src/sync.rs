//! State synchronization - batching, liveness and resync timers
//!
//! Everything here is driven by explicit `Instant`s so the bridge actor owns
//! the clock and the tests can step through time deterministically.

pub mod batcher;
pub mod engine;
pub mod liveness;
pub mod resync;
pub mod timer;

pub use batcher::{FlushBatch, QueueKind, UpdateBatcher};
pub use engine::{EngineEvent, SyncEngine};
pub use liveness::{LivenessMonitor, LivenessState};
pub use resync::ResyncCoordinator;
pub use timer::{DebounceTimer, IntervalTimer, ThrottleTimer};
