//! The jitter buffer and its parts.
//!
//! - [`JitterBuffer`] - the per-sender engine: ring, state machine, admission
//! - [`State`] - lifecycle states
//! - [`QueueStats`] - anomaly and playback counters
//!
//! Slot storage and ring index math are internal.

mod block;
mod ring;

pub mod jitter_buffer;
pub mod state;
pub mod stats;

pub use jitter_buffer::{JitterBuffer, MAX_CAPACITY, TickOutcome};
pub use state::State;
pub use stats::{QueueStats, StatsSnapshot};
