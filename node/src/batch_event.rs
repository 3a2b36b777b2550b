//! Events emitted while a batch runs, for subscribers.

use std::fmt;
use std::time::Duration;

use dave_types::{Timestamp, Work};

/// Orchestrator state for one iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitPeers,
    ComputeWork,
    Sign,
    Submit,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::AwaitPeers => "await_peers",
            Phase::ComputeWork => "compute_work",
            Phase::Sign => "sign",
            Phase::Submit => "submit",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Batch-level events that observers can subscribe to via the [`EventBus`].
#[derive(Clone, Debug, PartialEq)]
pub enum BatchEvent {
    /// An iteration moved to a new phase.
    PhaseEntered { iteration: usize, phase: Phase },
    /// Enough peers were seen.
    PeersReady {
        iteration: usize,
        peers: usize,
        waited: Duration,
    },
    /// The challenge for an iteration was fixed.
    ChallengeBuilt {
        iteration: usize,
        key: String,
        time: Timestamp,
    },
    /// A solution was found.
    Solved {
        iteration: usize,
        key: String,
        work: Work,
        elapsed: Duration,
    },
    /// The engine confirmed the record was sent.
    Acked { iteration: usize, key: String },
}

/// Synchronous fan-out event bus for batch events.
///
/// Listeners are invoked inline on the orchestrating task; keep handlers fast
/// to avoid stalling the batch.
pub struct EventBus {
    listeners: Vec<Box<dyn Fn(&BatchEvent) + Send + Sync>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: Box<dyn Fn(&BatchEvent) + Send + Sync>) {
        self.listeners.push(listener);
    }

    pub fn emit(&self, event: &BatchEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
