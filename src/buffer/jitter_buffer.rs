//! The jitter buffer engine: one bounded ring of network blocks per sender.
//!
//! Two independent execution contexts drive a queue. Packet arrival calls
//! [`JitterBuffer::enqueue`]; the audio output clock calls
//! [`JitterBuffer::tick`] once per frame period. A single internal mutex
//! serializes the two, and every critical section is allocation-free and
//! bounded by the ring capacity, so neither entry point can stall the other
//! past one admission or one frame copy.
//!
//! Lifecycle: a queue is `Stopped` until its endpoint is bound, then collects
//! a contiguous run of `prefill` packets while `Syncing`, plays the ring down
//! while `Playing`, and conceals underruns with silence while `Recovering`
//! until the ring refills or a timeout sends it back to `Syncing`.

use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::buffer::block::{NetworkBlock, wire_payload, wire_seqno};
use crate::buffer::ring;
use crate::buffer::state::State;
use crate::buffer::stats::QueueStats;
use crate::endpoint::RemoteEndpoint;
use crate::format::StreamFormat;
use crate::time::{MonotonicClock, TimeSource};

/// Upper bound on the ring capacity. The slot arena is allocated at this size
/// once, so capacity changes never move data.
pub const MAX_CAPACITY: usize = 9;

const DEFAULT_CAPACITY: usize = 7;
const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_millis(1000);

/// Emit a statistics line every this many played frames.
const STATS_LOG_INTERVAL: u64 = 10_000;

/// What one output period produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Queue is stopped or still syncing; nothing was written.
    Idle,
    /// A frame of buffered network audio was written.
    Played,
    /// The queue is recovering; a silent frame was written.
    Concealed,
    /// The supplied frame buffer was unusable; the period was dropped.
    Skipped,
}

struct Inner {
    state: State,
    endpoint: RemoteEndpoint,
    slots: Vec<NetworkBlock>,
    capacity: usize,
    prefill: usize,
    /// Next slot to be written.
    free_head: usize,
    /// Oldest slot not yet fully played.
    used_tail: usize,
    /// Frame cursor inside the block at `used_tail`.
    subindex: usize,
    recovery_started_at: u64,
    recovery_timeout_micros: u64,
    last_packet_at: u64,
}

/// A per-sender jitter buffer feeding a fixed-rate output clock.
///
/// Packets land via [`enqueue`](Self::enqueue) in arrival order, possibly out
/// of sequence order; [`tick`](Self::tick) hands out one fixed-size frame per
/// output period. Sequence gaps are covered with silent placeholder blocks,
/// underruns are concealed and recovered from, and everything anomalous is
/// surfaced through [`QueueStats`] rather than errors.
pub struct JitterBuffer {
    format: StreamFormat,
    clock: Arc<dyn TimeSource>,
    stats: QueueStats,
    inner: Mutex<Inner>,
}

impl JitterBuffer {
    pub fn new(format: StreamFormat) -> Self {
        Self::with_clock(format, Arc::new(MonotonicClock::new()))
    }

    /// Build a queue on an explicit clock. Simulations and tests inject a
    /// [`ManualClock`](crate::time::ManualClock) here.
    pub fn with_clock(format: StreamFormat, clock: Arc<dyn TimeSource>) -> Self {
        let slots = (0..MAX_CAPACITY).map(|_| NetworkBlock::silent(&format)).collect();
        Self {
            format,
            clock,
            stats: QueueStats::new(),
            inner: Mutex::new(Inner {
                state: State::Stopped,
                endpoint: RemoteEndpoint::unbound(),
                slots,
                capacity: DEFAULT_CAPACITY,
                prefill: DEFAULT_CAPACITY / 2,
                free_head: 0,
                used_tail: 0,
                subindex: 0,
                recovery_started_at: 0,
                recovery_timeout_micros: DEFAULT_RECOVERY_TIMEOUT.as_micros() as u64,
                last_packet_at: 0,
            }),
        }
    }

    // --- packet admission ---

    /// Admit one wire packet.
    ///
    /// The buffer must be exactly [`StreamFormat::packet_bytes`] long; anything
    /// else is a caller bug and returns an error. Protocol anomalies (late,
    /// early, discontinuous) are not errors: the packet is dropped, a counter
    /// moves, and `Ok(())` comes back.
    pub fn enqueue(&self, packet: &[u8]) -> Result<()> {
        if packet.len() != self.format.packet_bytes() {
            anyhow::bail!(
                "packet size {} does not match wire format ({} bytes)",
                packet.len(),
                self.format.packet_bytes()
            );
        }
        let now = self.clock.now_micros();
        let seqno = wire_seqno(packet);
        let payload = wire_payload(packet);

        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            State::Stopped => {} // unbound, drop silently
            State::Syncing => inner.admit_syncing(payload, seqno, now, &self.format, &self.stats),
            State::Playing | State::Recovering => {
                inner.admit_streaming(payload, seqno, now, &self.stats)
            }
        }
        Ok(())
    }

    // --- output tick ---

    /// Produce the next output frame into `out`.
    ///
    /// Runs in the audio callback context: no allocation, no waiting beyond
    /// the internal mutex shared with `enqueue`. A frame buffer of the wrong
    /// length cannot be filled; that period is dropped and reported, with no
    /// state change.
    pub fn tick(&self, out: &mut [i16]) -> TickOutcome {
        if out.len() != self.format.samples_per_frame {
            warn!(
                got = out.len(),
                want = self.format.samples_per_frame,
                "tick: unusable output frame, dropping period"
            );
            self.stats.record_skipped_tick();
            return TickOutcome::Skipped;
        }

        let now = self.clock.now_micros();
        let mut inner = self.inner.lock().unwrap();
        let outcome = match inner.state {
            State::Stopped | State::Syncing => return TickOutcome::Idle,
            State::Playing => {
                out.copy_from_slice(
                    inner.slots[inner.used_tail].frame(inner.subindex, self.format.samples_per_frame),
                );
                inner.subindex = (inner.subindex + 1) % self.format.frames_per_packet;
                if inner.subindex == 0 {
                    if inner.used_tail != inner.free_head {
                        inner.used_tail = ring::next_index(inner.used_tail, inner.capacity);
                    } else {
                        // ring drained on a block boundary
                        inner.switch_state(State::Recovering, &self.stats, now);
                    }
                }
                TickOutcome::Played
            }
            State::Recovering => {
                out.fill(0);
                inner.subindex = (inner.subindex + 1) % self.format.frames_per_packet;
                if inner.subindex == 0 {
                    if now.saturating_sub(inner.recovery_started_at) > inner.recovery_timeout_micros
                    {
                        inner.switch_state(State::Syncing, &self.stats, now);
                    } else {
                        // keep the virtual playback seqno moving so a later
                        // real packet's delta still lines up
                        let tail = inner.used_tail;
                        inner.slots[tail].seqno = inner.slots[tail].seqno.wrapping_add(1);
                    }
                }
                TickOutcome::Concealed
            }
        };

        let played = self.stats.record_frame_played();
        if played % STATS_LOG_INTERVAL == 0 {
            debug!(
                endpoint = %inner.endpoint,
                state = %inner.state,
                queue_len = inner.len(),
                subindex = inner.subindex,
                stats = ?self.stats.snapshot(),
                "queue status"
            );
        }
        outcome
    }

    // --- endpoint binding ---

    /// Bind the remote sender. A non-zero port arms the queue, a zero port
    /// stops it.
    pub fn bind(&self, remote: SocketAddr) {
        let now = self.clock.now_micros();
        let mut inner = self.inner.lock().unwrap();
        inner.endpoint = RemoteEndpoint::from(remote);
        inner.last_packet_at = now;
        let armed = inner.endpoint.is_bound();
        let target = if armed { State::Syncing } else { State::Stopped };
        inner.switch_state(target, &self.stats, now);
    }

    /// Set only the remote address; the lifecycle is driven by the port.
    pub fn set_addr(&self, addr: IpAddr) {
        self.inner.lock().unwrap().endpoint.addr = addr;
    }

    /// Set the remote port, arming (non-zero) or disarming (zero) the queue.
    pub fn set_port(&self, port: u16) {
        let now = self.clock.now_micros();
        let mut inner = self.inner.lock().unwrap();
        inner.endpoint.port = port;
        if port != 0 {
            inner.last_packet_at = now;
            inner.switch_state(State::Syncing, &self.stats, now);
        } else {
            inner.switch_state(State::Stopped, &self.stats, now);
        }
    }

    /// Disarm the queue. Statistics reset on the transition into stopped.
    pub fn unbind(&self) {
        self.set_port(0);
    }

    pub fn endpoint(&self) -> RemoteEndpoint {
        self.inner.lock().unwrap().endpoint
    }

    // --- configuration ---

    /// Set the ring capacity, bounded to `[2, MAX_CAPACITY]`. Out-of-bounds
    /// values are rejected and leave the previous configuration in effect.
    /// Prefill resets to `capacity / 2`, which keeps it below capacity.
    pub fn set_capacity(&self, capacity: usize) {
        let mut inner = self.inner.lock().unwrap();
        if !(2..=MAX_CAPACITY).contains(&capacity) {
            warn!(capacity, "set_capacity: value out of bounds, keeping {}", inner.capacity);
            return;
        }
        inner.capacity = capacity;
        inner.prefill = capacity / 2;
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().unwrap().capacity
    }

    /// Set the prefill threshold. Must stay below capacity or the queue could
    /// never reach `playing`; larger values are rejected.
    pub fn set_prefill(&self, prefill: usize) {
        let mut inner = self.inner.lock().unwrap();
        if prefill == 0 || prefill >= inner.capacity {
            warn!(
                prefill,
                capacity = inner.capacity,
                "set_prefill: value out of bounds, keeping {}",
                inner.prefill
            );
            return;
        }
        inner.prefill = prefill;
    }

    pub fn prefill(&self) -> usize {
        self.inner.lock().unwrap().prefill
    }

    pub fn set_recovery_timeout(&self, timeout: Duration) {
        self.inner.lock().unwrap().recovery_timeout_micros = timeout.as_micros() as u64;
    }

    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_micros(self.inner.lock().unwrap().recovery_timeout_micros)
    }

    // --- introspection ---

    pub fn state(&self) -> State {
        self.inner.lock().unwrap().state
    }

    /// Occupied ring length in blocks.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sequence number of the block currently at the play cursor.
    pub fn current_seqno(&self) -> u32 {
        let inner = self.inner.lock().unwrap();
        inner.slots[inner.used_tail].seqno
    }

    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    /// Microseconds since the last admitted packet (or since binding).
    pub fn idle_micros(&self) -> u64 {
        let inner = self.inner.lock().unwrap();
        self.clock.now_micros().saturating_sub(inner.last_packet_at)
    }

    /// Clear all counters and the frame cursor without touching the ring.
    pub fn reset_stats(&self) {
        self.stats.reset();
        self.inner.lock().unwrap().subindex = 0;
    }

    /// One-shot diagnostic dump of the queue, `info` level.
    pub fn log_status(&self) {
        let inner = self.inner.lock().unwrap();
        info!(
            endpoint = %inner.endpoint,
            state = %inner.state,
            capacity = inner.capacity,
            prefill = inner.prefill,
            queue_len = inner.len(),
            subindex = inner.subindex,
            current_seqno = inner.slots[inner.used_tail].seqno,
            stats = ?self.stats.snapshot(),
            "queue status"
        );
    }
}

impl Inner {
    fn len(&self) -> usize {
        ring::occupied_len(self.free_head, self.used_tail, self.capacity)
    }

    /// Syncing admission: grow the contiguous run, restart it on any break.
    fn admit_syncing(
        &mut self,
        payload: &[u8],
        seqno: u32,
        now: u64,
        format: &StreamFormat,
        stats: &QueueStats,
    ) {
        let head = self.free_head;
        self.slots[head].load(payload, seqno, now);

        if head != self.used_tail && !self.continuity_ok(head, format) {
            // this packet becomes the new anchor of the run
            debug!(seqno, "sync run restarted");
            self.used_tail = head;
        }
        self.free_head = ring::next_index(head, self.capacity);
        self.last_packet_at = now;

        if self.len() == self.prefill {
            self.switch_state(State::Playing, stats, now);
        }
    }

    /// Playing/recovering admission: classify by distance from the block at
    /// the play cursor, then append, gap-fill, or hole-fill.
    fn admit_streaming(&mut self, payload: &[u8], seqno: u32, now: u64, stats: &QueueStats) {
        let current = self.slots[self.used_tail].seqno;
        let delta = seqno.wrapping_sub(current) as i32;

        if delta < 1 {
            debug!(seqno, current, delta, "late packet dropped");
            stats.record_late_packet();
            return;
        }
        let delta = delta as usize;
        if delta > self.capacity - 1 {
            debug!(seqno, current, delta, "early packet dropped");
            stats.record_early_packet();
            return;
        }

        let len = self.len();
        if delta > len {
            // cover the gap with silent placeholders, then land the packet
            let missing = delta - len;
            debug!(seqno, missing, "gap ahead of packet, synthesizing placeholders");
            for _ in 0..missing {
                let head = self.free_head;
                let next_seqno =
                    self.slots[ring::prev_index(head, self.capacity)].seqno.wrapping_add(1);
                self.slots[head].synthesize(next_seqno, now);
                self.free_head = ring::next_index(head, self.capacity);
            }
            let head = self.free_head;
            self.slots[head].load(payload, seqno, now);
            self.free_head = ring::next_index(head, self.capacity);
        } else if delta == len {
            let head = self.free_head;
            self.slots[head].load(payload, seqno, now);
            self.free_head = ring::next_index(head, self.capacity);
        } else {
            // fills a hole in an already-allocated stretch of the ring
            let at = ring::nth_index_after(self.used_tail, delta, self.capacity);
            self.slots[at].load(payload, seqno, now);
        }
        self.last_packet_at = now;

        if self.state == State::Recovering && self.len() == self.prefill {
            self.switch_state(State::Playing, stats, now);
        }
    }

    /// Continuity between the block at `index` and its ring predecessor:
    /// consecutive seqnos, and arrival spacing within [1/3, 4/3] of one
    /// packet's nominal duration.
    fn continuity_ok(&self, index: usize, format: &StreamFormat) -> bool {
        let prev = &self.slots[ring::prev_index(index, self.capacity)];
        let cur = &self.slots[index];

        if prev.seqno.wrapping_add(1) != cur.seqno {
            debug!(prev = prev.seqno, cur = cur.seqno, "seqno discontinuity");
            return false;
        }

        let duration = format.packet_duration_micros();
        if prev.timestamp + duration / 3 > cur.timestamp {
            debug!(prev = prev.timestamp, cur = cur.timestamp, "implausibly fast arrival");
            return false;
        }
        if prev.timestamp + duration * 4 / 3 < cur.timestamp {
            debug!(prev = prev.timestamp, cur = cur.timestamp, "implausibly slow arrival");
            return false;
        }
        true
    }

    /// Apply one transition from the lifecycle table. Anything not in the
    /// table is rejected and the current state kept.
    fn switch_state(&mut self, to: State, stats: &QueueStats, now: u64) {
        let from = self.state;
        match (from, to) {
            (State::Stopped, State::Syncing) => {}
            (State::Syncing, State::Stopped)
            | (State::Playing, State::Stopped)
            | (State::Recovering, State::Stopped) => {
                stats.reset();
                self.subindex = 0;
            }
            (State::Syncing, State::Playing) => {}
            (State::Playing, State::Recovering) => {
                self.recovery_started_at = now;
            }
            (State::Recovering, State::Syncing) => {
                stats.record_recovery_failed();
            }
            (State::Recovering, State::Playing) => {
                stats.record_recovery_succeeded();
            }
            _ => {
                warn!(%from, %to, "rejected invalid state transition");
                return;
            }
        }
        debug!(%from, %to, "state transition");
        self.state = to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualClock;
    use rand::seq::SliceRandom;

    /// 4 samples per frame, 2 frames per packet, 8 kHz: one packet covers
    /// exactly 1000 us, so the continuity window is [334, 1333] us.
    fn small_format() -> StreamFormat {
        StreamFormat::new(4, 2, 8000).unwrap()
    }

    struct Fixture {
        buf: JitterBuffer,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new());
        let buf = JitterBuffer::with_clock(small_format(), clock.clone());
        Fixture { buf, clock }
    }

    fn bound_fixture() -> Fixture {
        let fx = fixture();
        fx.buf.bind("10.0.0.1:9000".parse().unwrap());
        fx
    }

    /// A wire packet whose every sample equals `fill`.
    fn packet(seqno: u32, fill: i16) -> Vec<u8> {
        let fmt = small_format();
        let mut bytes = Vec::new();
        for _ in 0..fmt.packet_samples() {
            bytes.extend_from_slice(&fill.to_le_bytes());
        }
        bytes.extend_from_slice(&seqno.to_le_bytes());
        bytes.extend_from_slice(&[0; 4]);
        bytes
    }

    /// Advance the clock by one nominal packet duration, then enqueue.
    fn send(fx: &Fixture, seqno: u32) {
        fx.clock.advance_micros(1000);
        fx.buf.enqueue(&packet(seqno, seqno as i16)).unwrap();
    }

    fn tick(fx: &Fixture) -> (TickOutcome, Vec<i16>) {
        let mut out = vec![0i16; small_format().samples_per_frame];
        let outcome = fx.buf.tick(&mut out);
        (outcome, out)
    }

    /// Tick through one whole network block, asserting a uniform outcome.
    fn tick_block(fx: &Fixture, expect: TickOutcome) -> Vec<i16> {
        let mut samples = Vec::new();
        for _ in 0..small_format().frames_per_packet {
            let (outcome, frame) = tick(fx);
            assert_eq!(outcome, expect);
            samples.extend(frame);
        }
        samples
    }

    #[test]
    fn test_stopped_queue_ignores_both_entry_points() {
        let fx = fixture();
        assert_eq!(fx.buf.state(), State::Stopped);
        fx.buf.enqueue(&packet(1, 1)).unwrap();
        assert_eq!(fx.buf.len(), 0);
        assert_eq!(tick(&fx).0, TickOutcome::Idle);
        assert_eq!(fx.buf.stats().snapshot().frames_played, 0);
    }

    #[test]
    fn test_bind_arms_syncing_and_unbind_stops() {
        let fx = fixture();
        fx.buf.bind("10.0.0.1:9000".parse().unwrap());
        assert_eq!(fx.buf.state(), State::Syncing);
        assert!(fx.buf.endpoint().is_bound());

        fx.buf.unbind();
        assert_eq!(fx.buf.state(), State::Stopped);
        assert!(!fx.buf.endpoint().is_bound());
    }

    #[test]
    fn test_enqueue_rejects_wrong_size() {
        let fx = bound_fixture();
        assert!(fx.buf.enqueue(&[0u8; 3]).is_err());
        assert_eq!(fx.buf.len(), 0);
    }

    #[test]
    fn test_exactly_prefill_contiguous_packets_reach_playing() {
        for capacity in 2..=MAX_CAPACITY {
            for prefill in 1..capacity {
                let fx = fixture();
                fx.buf.set_capacity(capacity);
                fx.buf.set_prefill(prefill);
                fx.buf.bind("10.0.0.1:9000".parse().unwrap());

                for i in 0..prefill as u32 {
                    assert_eq!(
                        fx.buf.state(),
                        State::Syncing,
                        "capacity {capacity} prefill {prefill}: playing too early"
                    );
                    send(&fx, 100 + i);
                }
                assert_eq!(
                    fx.buf.state(),
                    State::Playing,
                    "capacity {capacity} prefill {prefill}: not playing after prefill packets"
                );
                assert_eq!(fx.buf.len(), prefill);
            }
        }
    }

    #[test]
    fn test_discontinuous_packet_restarts_sync_run() {
        let fx = bound_fixture();
        send(&fx, 10);
        send(&fx, 11);
        assert_eq!(fx.buf.len(), 2);

        // gap: run restarts anchored at this packet
        send(&fx, 13);
        assert_eq!(fx.buf.state(), State::Syncing);
        assert_eq!(fx.buf.len(), 1);

        send(&fx, 14);
        send(&fx, 15);
        assert_eq!(fx.buf.state(), State::Playing);
    }

    #[test]
    fn test_burst_arrival_restarts_sync_run() {
        let fx = bound_fixture();
        send(&fx, 10);
        // consecutive seqno but arriving instantly, below 1/3 packet duration
        fx.buf.enqueue(&packet(11, 11)).unwrap();
        assert_eq!(fx.buf.len(), 1);
        assert_eq!(fx.buf.state(), State::Syncing);
    }

    #[test]
    fn test_stalled_arrival_restarts_sync_run() {
        let fx = bound_fixture();
        send(&fx, 10);
        // consecutive seqno but spaced at twice the packet duration
        fx.clock.advance_micros(2000);
        fx.buf.enqueue(&packet(11, 11)).unwrap();
        assert_eq!(fx.buf.len(), 1);
    }

    /// Drive a fresh queue to `Playing` with seqnos 100.. and default
    /// capacity 7 / prefill 3.
    fn playing_fixture() -> Fixture {
        let fx = bound_fixture();
        for seqno in 100..103 {
            send(&fx, seqno);
        }
        assert_eq!(fx.buf.state(), State::Playing);
        fx
    }

    #[test]
    fn test_late_packet_counted_and_ring_untouched() {
        let fx = playing_fixture();
        let len = fx.buf.len();

        send(&fx, 100); // delta 0
        send(&fx, 95); // wrapped negative delta
        assert_eq!(fx.buf.stats().late_packets(), 2);
        assert_eq!(fx.buf.len(), len);
        assert_eq!(fx.buf.state(), State::Playing);
    }

    #[test]
    fn test_early_packet_counted_and_ring_untouched() {
        let fx = playing_fixture();
        let len = fx.buf.len();

        // capacity 7: delta 7 is one past the last admissible slot
        send(&fx, 107);
        assert_eq!(fx.buf.stats().early_packets(), 1);
        assert_eq!(fx.buf.len(), len);
    }

    #[test]
    fn test_gap_is_filled_with_silent_placeholders() {
        let fx = playing_fixture();
        assert_eq!(fx.buf.len(), 3);

        // delta 5, occupied 3: two placeholders (103, 104) then the packet
        send(&fx, 105);
        assert_eq!(fx.buf.len(), 6);

        for seqno in [100, 101, 102] {
            assert_eq!(fx.buf.current_seqno(), seqno);
            let samples = tick_block(&fx, TickOutcome::Played);
            assert!(samples.iter().all(|&s| s == seqno as i16));
        }
        for seqno in [103, 104] {
            assert_eq!(fx.buf.current_seqno(), seqno);
            let samples = tick_block(&fx, TickOutcome::Played);
            assert!(samples.iter().all(|&s| s == 0), "placeholder {seqno} not silent");
        }
        assert_eq!(fx.buf.current_seqno(), 105);
        let samples = tick_block(&fx, TickOutcome::Played);
        assert!(samples.iter().all(|&s| s == 105));
    }

    #[test]
    fn test_reordered_packet_fills_its_hole() {
        let fx = playing_fixture();

        send(&fx, 104); // placeholder 103, then 104
        assert_eq!(fx.buf.len(), 5);
        send(&fx, 103); // lands in the hole, no cursor movement
        assert_eq!(fx.buf.len(), 5);

        for seqno in 100..=104 {
            assert_eq!(fx.buf.current_seqno(), seqno);
            let samples = tick_block(&fx, TickOutcome::Played);
            assert!(
                samples.iter().all(|&s| s == seqno as i16),
                "block {seqno} should carry real payload"
            );
        }
    }

    #[test]
    fn test_shuffled_arrival_is_reassembled_in_order() {
        let fx = playing_fixture();

        let mut batch: Vec<u32> = (103..106).collect();
        batch.shuffle(&mut rand::thread_rng());
        for seqno in batch {
            send(&fx, seqno);
        }

        // every hole got refilled with the real payloads
        for seqno in 100..106 {
            assert_eq!(fx.buf.current_seqno(), seqno);
            let samples = tick_block(&fx, TickOutcome::Played);
            assert!(samples.iter().all(|&s| s == seqno as i16));
        }
    }

    #[test]
    fn test_drain_transitions_to_recovering() {
        let fx = playing_fixture();

        // three real blocks, then one residual block while the underrun is
        // detected at the following block boundary
        for _ in 0..3 {
            tick_block(&fx, TickOutcome::Played);
        }
        assert_eq!(fx.buf.len(), 0);
        assert_eq!(fx.buf.state(), State::Playing);
        tick_block(&fx, TickOutcome::Played);
        assert_eq!(fx.buf.state(), State::Recovering);

        let samples = tick_block(&fx, TickOutcome::Concealed);
        assert!(samples.iter().all(|&s| s == 0));
    }

    fn recovering_fixture() -> Fixture {
        let fx = playing_fixture();
        for _ in 0..4 {
            tick_block(&fx, TickOutcome::Played);
        }
        assert_eq!(fx.buf.state(), State::Recovering);
        fx
    }

    #[test]
    fn test_recovery_refill_resumes_playing() {
        let fx = recovering_fixture();
        let base = fx.buf.current_seqno();

        // gap-fills one placeholder ahead of the packet
        send(&fx, base.wrapping_add(1));
        assert_eq!(fx.buf.len(), 2);
        assert_eq!(fx.buf.state(), State::Recovering);

        // the placeholder landed on the play-cursor slot, so the virtual
        // seqno moved; append relative to it until prefill is reached
        let base = fx.buf.current_seqno();
        send(&fx, base.wrapping_add(2));
        assert_eq!(fx.buf.len(), 3); // prefill reached
        assert_eq!(fx.buf.state(), State::Playing);
        assert_eq!(fx.buf.stats().recoveries_succeeded(), 1);
        assert_eq!(fx.buf.stats().recoveries_failed(), 0);
    }

    #[test]
    fn test_recovery_timeout_falls_back_to_syncing() {
        let fx = recovering_fixture();

        fx.clock.advance_millis(1001);
        tick_block(&fx, TickOutcome::Concealed);
        assert_eq!(fx.buf.state(), State::Syncing);
        assert_eq!(fx.buf.stats().recoveries_failed(), 1);

        // syncing produces nothing
        assert_eq!(tick(&fx).0, TickOutcome::Idle);
    }

    #[test]
    fn test_recovery_timeout_is_configurable() {
        let fx = playing_fixture();
        fx.buf.set_recovery_timeout(Duration::from_millis(50));
        for _ in 0..4 {
            tick_block(&fx, TickOutcome::Played);
        }
        assert_eq!(fx.buf.state(), State::Recovering);

        fx.clock.advance_millis(51);
        tick_block(&fx, TickOutcome::Concealed);
        assert_eq!(fx.buf.state(), State::Syncing);
    }

    #[test]
    fn test_concealment_keeps_virtual_seqno_advancing() {
        let fx = recovering_fixture();
        let before = fx.buf.current_seqno();
        tick_block(&fx, TickOutcome::Concealed);
        tick_block(&fx, TickOutcome::Concealed);
        assert_eq!(fx.buf.current_seqno(), before.wrapping_add(2));
    }

    #[test]
    fn test_enqueued_payload_survives_to_output() {
        let fx = bound_fixture();
        fx.buf.set_prefill(1);

        let fmt = small_format();
        let mut bytes = Vec::new();
        let want: Vec<i16> = (0..fmt.packet_samples() as i16).map(|i| i * 3 - 7).collect();
        for s in &want {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        bytes.extend_from_slice(&77u32.to_le_bytes());
        bytes.extend_from_slice(&[0; 4]);

        fx.clock.advance_micros(1000);
        fx.buf.enqueue(&bytes).unwrap();
        assert_eq!(fx.buf.state(), State::Playing);

        let got = tick_block(&fx, TickOutcome::Played);
        assert_eq!(got, want);
    }

    #[test]
    fn test_capacity_9_prefill_4_gap_scenario() {
        let fx = fixture();
        fx.buf.set_capacity(9);
        assert_eq!(fx.buf.prefill(), 4);
        fx.buf.bind("10.0.0.1:9000".parse().unwrap());

        for seqno in 100..104 {
            send(&fx, seqno);
        }
        assert_eq!(fx.buf.state(), State::Playing);

        // drain packet 100 completely; play cursor moves onto 101
        tick_block(&fx, TickOutcome::Played);
        assert_eq!(fx.buf.current_seqno(), 101);
        assert_eq!(fx.buf.len(), 3);

        // delta 4 against occupied 3: exactly one synthesized block (104)
        send(&fx, 105);
        assert_eq!(fx.buf.len(), 5);

        for seqno in [101, 102, 103] {
            let samples = tick_block(&fx, TickOutcome::Played);
            assert!(samples.iter().all(|&s| s == seqno as i16));
        }
        assert_eq!(fx.buf.current_seqno(), 104);
        let samples = tick_block(&fx, TickOutcome::Played);
        assert!(samples.iter().all(|&s| s == 0));
        assert_eq!(fx.buf.current_seqno(), 105);
    }

    #[test]
    fn test_capacity_out_of_bounds_is_rejected() {
        let fx = fixture();
        fx.buf.set_prefill(2);
        fx.buf.set_capacity(1);
        fx.buf.set_capacity(MAX_CAPACITY + 1);
        assert_eq!(fx.buf.capacity(), 7);
        assert_eq!(fx.buf.prefill(), 2);
    }

    #[test]
    fn test_capacity_change_resets_prefill() {
        let fx = fixture();
        fx.buf.set_capacity(8);
        assert_eq!(fx.buf.capacity(), 8);
        assert_eq!(fx.buf.prefill(), 4);
    }

    #[test]
    fn test_prefill_must_stay_below_capacity() {
        let fx = fixture();
        fx.buf.set_prefill(7);
        fx.buf.set_prefill(0);
        assert_eq!(fx.buf.prefill(), 3);
    }

    #[test]
    fn test_wrong_length_frame_drops_period() {
        let fx = playing_fixture();
        let mut out = vec![0i16; 3];
        assert_eq!(fx.buf.tick(&mut out), TickOutcome::Skipped);
        assert_eq!(fx.buf.stats().skipped_ticks(), 1);
        assert_eq!(fx.buf.state(), State::Playing);
        assert_eq!(fx.buf.len(), 3);

        // the next proper tick picks up where playback left off
        assert_eq!(fx.buf.current_seqno(), 100);
        let samples = tick_block(&fx, TickOutcome::Played);
        assert!(samples.iter().all(|&s| s == 100));
    }

    #[test]
    fn test_unbinding_resets_statistics() {
        let fx = playing_fixture();
        send(&fx, 100); // late
        tick_block(&fx, TickOutcome::Played);
        assert_ne!(fx.buf.stats().snapshot(), Default::default());

        fx.buf.unbind();
        assert_eq!(fx.buf.stats().snapshot(), Default::default());
    }

    #[test]
    fn test_seqno_wraparound_is_continuous() {
        let fx = bound_fixture();
        for seqno in [u32::MAX - 1, u32::MAX, 0] {
            send(&fx, seqno);
        }
        assert_eq!(fx.buf.state(), State::Playing);

        // append across the wrap while playing
        send(&fx, 1);
        assert_eq!(fx.buf.len(), 4);
    }

    #[test]
    fn test_idle_micros_tracks_last_packet() {
        let fx = playing_fixture();
        fx.clock.advance_micros(5000);
        assert_eq!(fx.buf.idle_micros(), 5000);
        send(&fx, 103);
        assert_eq!(fx.buf.idle_micros(), 0);
    }
}
