//! Lifecycle states of a playout queue.

/// Where a queue is in its life between binding and playback.
///
/// - `Stopped`: unbound, both entry points are no-ops.
/// - `Syncing`: collecting a contiguous run of packets, no output yet.
/// - `Playing`: steady state, the ring drains at the output rate.
/// - `Recovering`: underrun, silence plays while the ring refills or a
///   timeout sends the queue back to `Syncing`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Stopped,
    Syncing,
    Playing,
    Recovering,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            State::Stopped => "stopped",
            State::Syncing => "syncing",
            State::Playing => "playing",
            State::Recovering => "recovering",
        };
        f.write_str(name)
    }
}
