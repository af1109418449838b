//! Stream format and wire layout of one network audio packet.
//!
//! A packet carries one network block: `frames_per_packet` output frames of
//! `samples_per_frame` mono i16 samples each, followed by a `u32` little-endian
//! sequence number and four reserved bytes where the receiver stamps its own
//! arrival timestamp. Nothing but the sequence number is trusted from the wire.

use anyhow::Result;

/// Bytes trailing the sample payload: u32 seqno + 4 reserved timestamp bytes.
pub const PACKET_TRAILER_BYTES: usize = 8;

/// Fixed audio format of a packet stream.
///
/// All queues fed by the same sender must agree on this out-of-band; the
/// receiver derives the exact wire size and the nominal packet duration from
/// it and rejects anything else.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamFormat {
    /// Samples delivered downstream per tick.
    pub samples_per_frame: usize,
    /// Output frames carried by one network block.
    pub frames_per_packet: usize,
    /// Sample rate in Hz, used only for packet duration math.
    pub sample_rate: u32,
}

impl StreamFormat {
    pub fn new(samples_per_frame: usize, frames_per_packet: usize, sample_rate: u32) -> Result<Self> {
        if samples_per_frame == 0 || frames_per_packet == 0 || sample_rate == 0 {
            anyhow::bail!(
                "invalid stream format: {}x{} @ {} Hz",
                samples_per_frame,
                frames_per_packet,
                sample_rate
            );
        }
        Ok(Self {
            samples_per_frame,
            frames_per_packet,
            sample_rate,
        })
    }

    /// Total samples in one network block.
    pub const fn packet_samples(&self) -> usize {
        self.samples_per_frame * self.frames_per_packet
    }

    /// Exact size of one packet on the wire, trailer included.
    pub const fn packet_bytes(&self) -> usize {
        self.packet_samples() * 2 + PACKET_TRAILER_BYTES
    }

    /// Nominal duration of the audio in one packet, in microseconds.
    pub const fn packet_duration_micros(&self) -> u64 {
        self.packet_samples() as u64 * 1_000_000 / self.sample_rate as u64
    }
}

impl Default for StreamFormat {
    fn default() -> Self {
        Self {
            samples_per_frame: 128,
            frames_per_packet: 8,
            sample_rate: 44100,
        }
    }
}
