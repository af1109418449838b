//! Per-queue statistics counters.
//!
//! Counters live outside the queue's mutex so introspection never contends
//! with the real-time paths. They only grow, except on transition into
//! `Stopped` or an explicit reset.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters describing what a queue has seen and done.
pub struct QueueStats {
    frames_played: AtomicU64,
    late_packets: AtomicU64,
    early_packets: AtomicU64,
    recoveries_succeeded: AtomicU64,
    recoveries_failed: AtomicU64,
    skipped_ticks: AtomicU64,
}

/// Point-in-time copy of [`QueueStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames_played: u64,
    pub late_packets: u64,
    pub early_packets: u64,
    pub recoveries_succeeded: u64,
    pub recoveries_failed: u64,
    pub skipped_ticks: u64,
}

impl QueueStats {
    pub(crate) fn new() -> Self {
        Self {
            frames_played: AtomicU64::new(0),
            late_packets: AtomicU64::new(0),
            early_packets: AtomicU64::new(0),
            recoveries_succeeded: AtomicU64::new(0),
            recoveries_failed: AtomicU64::new(0),
            skipped_ticks: AtomicU64::new(0),
        }
    }

    /// Frames delivered downstream, counting concealed (silent) frames.
    pub fn frames_played(&self) -> u64 {
        self.frames_played.load(Ordering::Acquire)
    }

    /// Packets discarded because their seqno was at or behind playback.
    pub fn late_packets(&self) -> u64 {
        self.late_packets.load(Ordering::Acquire)
    }

    /// Packets discarded because their seqno was beyond ring capacity.
    pub fn early_packets(&self) -> u64 {
        self.early_packets.load(Ordering::Acquire)
    }

    pub fn recoveries_succeeded(&self) -> u64 {
        self.recoveries_succeeded.load(Ordering::Acquire)
    }

    pub fn recoveries_failed(&self) -> u64 {
        self.recoveries_failed.load(Ordering::Acquire)
    }

    /// Output periods dropped because no usable frame buffer was supplied.
    pub fn skipped_ticks(&self) -> u64 {
        self.skipped_ticks.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_played: self.frames_played(),
            late_packets: self.late_packets(),
            early_packets: self.early_packets(),
            recoveries_succeeded: self.recoveries_succeeded(),
            recoveries_failed: self.recoveries_failed(),
            skipped_ticks: self.skipped_ticks(),
        }
    }

    pub(crate) fn record_frame_played(&self) -> u64 {
        self.frames_played.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn record_late_packet(&self) {
        self.late_packets.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_early_packet(&self) {
        self.early_packets.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_recovery_succeeded(&self) {
        self.recoveries_succeeded.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_recovery_failed(&self) {
        self.recoveries_failed.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_skipped_tick(&self) {
        self.skipped_ticks.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn reset(&self) {
        self.frames_played.store(0, Ordering::Release);
        self.late_packets.store(0, Ordering::Release);
        self.early_packets.store(0, Ordering::Release);
        self.recoveries_succeeded.store(0, Ordering::Release);
        self.recoveries_failed.store(0, Ordering::Release);
        self.skipped_ticks.store(0, Ordering::Release);
    }
}
