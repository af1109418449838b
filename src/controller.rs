//! Orchestration of a fixed table of playout queues.
//!
//! One [`QueueController`] owns [`NUM_QUEUES`] jitter buffers, routes each
//! arriving packet to the queue bound to its sender, and mixes one frame per
//! queue into a single output with per-queue gain. Queue index 0 is reserved
//! for loopback/local monitoring and is never handed out automatically.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::buffer::{JitterBuffer, TickOutcome};
use crate::format::StreamFormat;
use crate::pipeline::{FrameSource, PacketSink};
use crate::time::{MonotonicClock, TimeSource};

/// Size of the queue table.
pub const NUM_QUEUES: usize = 16;

/// Queue index reserved for loopback; the free-list scan starts past it.
const LOOPBACK_QUEUE: usize = 0;

/// A table of per-sender queues plus the gain/mix stage in front of the
/// audio output.
pub struct QueueController {
    queues: Vec<Arc<JitterBuffer>>,
    gains: Mutex<[f32; NUM_QUEUES]>,
    autoconnect: AtomicBool,
    autodisconnect: AtomicBool,
    clock: Arc<dyn TimeSource>,
    /// Per-queue frame staging for the mix step, allocated once.
    scratch: Mutex<Vec<i16>>,
}

impl QueueController {
    pub fn new(format: StreamFormat) -> Self {
        Self::with_clock(format, Arc::new(MonotonicClock::new()))
    }

    /// Build a controller whose queues all share an explicit clock.
    pub fn with_clock(format: StreamFormat, clock: Arc<dyn TimeSource>) -> Self {
        let queues = (0..NUM_QUEUES)
            .map(|_| Arc::new(JitterBuffer::with_clock(format, clock.clone())))
            .collect();
        Self {
            queues,
            gains: Mutex::new([1.0; NUM_QUEUES]),
            autoconnect: AtomicBool::new(true),
            autodisconnect: AtomicBool::new(true),
            clock,
            scratch: Mutex::new(vec![0; format.samples_per_frame]),
        }
    }

    pub fn queue(&self, index: usize) -> Option<&Arc<JitterBuffer>> {
        let queue = self.queues.get(index);
        if queue.is_none() {
            warn!(index, "queue index out of range");
        }
        queue
    }

    /// Index of the queue bound to this sender, if any.
    pub fn index_of(&self, addr: IpAddr, port: u16) -> Option<usize> {
        self.queues.iter().position(|q| {
            let ep = q.endpoint();
            ep.is_bound() && ep.addr == addr && ep.port == port
        })
    }

    /// First unbound queue, excluding the reserved loopback slot.
    pub fn free_index(&self) -> Option<usize> {
        (LOOPBACK_QUEUE + 1..NUM_QUEUES).find(|&i| !self.queues[i].endpoint().is_bound())
    }

    pub fn gain(&self, index: usize) -> f32 {
        self.gains.lock().unwrap()[index]
    }

    pub fn set_gain(&self, index: usize, gain: f32) {
        self.gains.lock().unwrap()[index] = gain;
    }

    pub fn autoconnect(&self) -> bool {
        self.autoconnect.load(Ordering::Acquire)
    }

    pub fn set_autoconnect(&self, val: bool) {
        self.autoconnect.store(val, Ordering::Release);
    }

    pub fn autodisconnect(&self) -> bool {
        self.autodisconnect.load(Ordering::Acquire)
    }

    pub fn set_autodisconnect(&self, val: bool) {
        self.autodisconnect.store(val, Ordering::Release);
    }

    /// Route one wire packet to its sender's queue.
    ///
    /// Unknown senders get a free queue when autoconnect is on; otherwise the
    /// packet is dropped. Routing failure is not an error, only a malformed
    /// packet is.
    pub fn route(&self, from: SocketAddr, packet: &[u8]) -> Result<()> {
        if let Some(index) = self.index_of(from.ip(), from.port()) {
            return self.queues[index].enqueue(packet);
        }

        if !self.autoconnect() {
            debug!(%from, "packet from unknown sender dropped (autoconnect off)");
            return Ok(());
        }
        match self.free_index() {
            Some(index) => {
                info!(index, %from, "autoconnecting new sender");
                self.queues[index].bind(from);
                self.queues[index].enqueue(packet)
            }
            None => {
                debug!(%from, "packet dropped, no free queue");
                Ok(())
            }
        }
    }

    /// Pull one frame from every queue and sum them, gain-weighted and
    /// saturated, into `out`. Returns how many queues contributed audio.
    ///
    /// Runs in the output callback context; the staging buffer is reused, so
    /// no allocation happens here.
    pub fn mix_into(&self, out: &mut [i16]) -> usize {
        out.fill(0);
        let gains = *self.gains.lock().unwrap();
        let mut scratch = self.scratch.lock().unwrap();
        let mut contributed = 0;

        for (index, queue) in self.queues.iter().enumerate() {
            match queue.next_frame(&mut scratch[..]) {
                TickOutcome::Played => {
                    let gain = gains[index];
                    for (acc, &sample) in out.iter_mut().zip(scratch.iter()) {
                        let mixed = *acc as i32 + (sample as f32 * gain) as i32;
                        *acc = mixed.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
                    }
                    contributed += 1;
                }
                // concealed frames are silence, nothing to add
                TickOutcome::Concealed | TickOutcome::Idle | TickOutcome::Skipped => {}
            }
        }
        contributed
    }

    /// Unbind every non-loopback queue whose sender has been silent longer
    /// than `idle`. No-op while autodisconnect is off.
    pub fn disconnect_idle(&self, idle: Duration) {
        if !self.autodisconnect() {
            return;
        }
        let idle_micros = idle.as_micros() as u64;
        for (index, queue) in self.queues.iter().enumerate().skip(LOOPBACK_QUEUE + 1) {
            if queue.endpoint().is_bound() && queue.idle_micros() > idle_micros {
                info!(index, endpoint = %queue.endpoint(), "disconnecting idle sender");
                queue.unbind();
            }
        }
    }

    /// Diagnostic dump of every bound queue, `info` level.
    pub fn log_queues(&self) {
        for (index, queue) in self.queues.iter().enumerate() {
            let ep = queue.endpoint();
            if !ep.is_bound() {
                continue;
            }
            info!(
                index,
                endpoint = %ep,
                gain = self.gain(index),
                state = %queue.state(),
                capacity = queue.capacity(),
                prefill = queue.prefill(),
                queue_len = queue.len(),
                "queue"
            );
        }
    }

    /// The shared clock the queues stamp arrivals with.
    pub fn clock(&self) -> &Arc<dyn TimeSource> {
        &self.clock
    }
}

impl PacketSink for QueueController {
    fn deliver(&self, from: SocketAddr, packet: &[u8]) -> Result<()> {
        self.route(from, packet)
    }
}
