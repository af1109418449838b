//! Jitter-buffered playout queues for real-time network audio.
//!
//! Each remote sender streams fixed-size, sequence-numbered audio packets
//! over an unreliable link; each [`JitterBuffer`] absorbs the arrival jitter
//! (reordering, bursts, gaps) behind a bounded ring and hands a steady frame
//! per output period to the audio clock.
//!
//! # Core
//! - [`JitterBuffer`] - per-sender ring, four-state lifecycle, packet
//!   admission and per-tick playout
//! - [`QueueController`] - table of queues keyed by sender endpoint, with
//!   routing, a free-list, and a gain/mix stage
//!
//! # Boundaries
//! - [`PacketSink`] - where a transport hands in raw packet bytes
//! - [`FrameSource`] - where the audio graph pulls frames on its schedule
//!
//! # Supporting types
//! - [`StreamFormat`] - packet wire layout and timing math
//! - [`RemoteEndpoint`] - sender identity; port zero means unbound
//! - [`QueueStats`] - per-queue anomaly and playback counters
//! - [`TimeSource`] - monotonic clock seam ([`ManualClock`] for simulations)
//!
//! No sockets and no audio devices live in this crate: transports push bytes
//! in through [`PacketSink`] and output callbacks pull frames out through
//! [`FrameSource`].

pub mod buffer;
pub mod controller;
pub mod endpoint;
pub mod format;
pub mod pipeline;
pub mod time;

pub use buffer::{JitterBuffer, MAX_CAPACITY, QueueStats, State, StatsSnapshot, TickOutcome};
pub use controller::{NUM_QUEUES, QueueController};
pub use endpoint::RemoteEndpoint;
pub use format::StreamFormat;
pub use pipeline::{FrameSource, PacketSink};
pub use time::{ManualClock, MonotonicClock, TimeSource};
