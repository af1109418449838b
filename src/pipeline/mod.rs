//! Object-safe seams between the queues and their collaborators.
//!
//! The orchestration layer talks to every queue through these two traits so
//! it never depends on the concrete buffer type:
//!
//! - [`FrameSource`] - produces the next output frame on demand; the audio
//!   graph calls this once per fixed period
//! - [`PacketSink`] - accepts raw packet bytes from a transport together with
//!   the sender's address

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;

use crate::buffer::{JitterBuffer, TickOutcome};

/// Produces one fixed-size audio frame per call, on the caller's schedule.
///
/// Implementations must be real-time safe: no allocation and no unbounded
/// waiting, since the caller is typically an audio output callback.
pub trait FrameSource: Send + Sync {
    fn next_frame(&self, out: &mut [i16]) -> TickOutcome;
}

/// Accepts raw packet bytes arriving from a network transport.
pub trait PacketSink: Send + Sync {
    fn deliver(&self, from: SocketAddr, packet: &[u8]) -> Result<()>;
}

impl FrameSource for JitterBuffer {
    fn next_frame(&self, out: &mut [i16]) -> TickOutcome {
        self.tick(out)
    }
}

impl FrameSource for Arc<dyn FrameSource> {
    fn next_frame(&self, out: &mut [i16]) -> TickOutcome {
        (**self).next_frame(out)
    }
}

impl PacketSink for Arc<dyn PacketSink> {
    fn deliver(&self, from: SocketAddr, packet: &[u8]) -> Result<()> {
        (**self).deliver(from, packet)
    }
}
