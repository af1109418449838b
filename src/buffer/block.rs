//! Slot storage for one landed network block.
//!
//! Slot payload vectors are allocated once when the queue is built; landing a
//! packet or synthesizing a placeholder only rewrites them in place, so the
//! admission path never allocates.

use crate::format::{PACKET_TRAILER_BYTES, StreamFormat};

/// One network packet's audio after landing in the ring: fixed-length sample
/// payload, its wire sequence number, and the local receipt timestamp stamped
/// by the admission routine.
pub(crate) struct NetworkBlock {
    pub samples: Vec<i16>,
    pub seqno: u32,
    pub timestamp: u64,
}

impl NetworkBlock {
    pub(crate) fn silent(format: &StreamFormat) -> Self {
        Self {
            samples: vec![0; format.packet_samples()],
            seqno: 0,
            timestamp: 0,
        }
    }

    /// Overwrite this slot with a real packet's payload.
    pub(crate) fn load(&mut self, payload: &[u8], seqno: u32, timestamp: u64) {
        debug_assert_eq!(payload.len(), self.samples.len() * 2);
        for (sample, bytes) in self.samples.iter_mut().zip(payload.chunks_exact(2)) {
            *sample = i16::from_le_bytes([bytes[0], bytes[1]]);
        }
        self.seqno = seqno;
        self.timestamp = timestamp;
    }

    /// Overwrite this slot with a silent placeholder that keeps the sequence
    /// contiguous across a mid-stream gap.
    pub(crate) fn synthesize(&mut self, seqno: u32, timestamp: u64) {
        self.samples.fill(0);
        self.seqno = seqno;
        self.timestamp = timestamp;
    }

    /// Sub-block of samples played on one tick.
    pub(crate) fn frame(&self, subindex: usize, samples_per_frame: usize) -> &[i16] {
        let start = subindex * samples_per_frame;
        &self.samples[start..start + samples_per_frame]
    }
}

/// Sequence number from the wire: the u32 right after the sample payload.
pub(crate) fn wire_seqno(packet: &[u8]) -> u32 {
    let at = packet.len() - PACKET_TRAILER_BYTES;
    u32::from_le_bytes([packet[at], packet[at + 1], packet[at + 2], packet[at + 3]])
}

/// Sample payload portion of a wire packet.
pub(crate) fn wire_payload(packet: &[u8]) -> &[u8] {
    &packet[..packet.len() - PACKET_TRAILER_BYTES]
}
