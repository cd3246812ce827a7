//! The process-wide trip flag: a single atomic boolean raised by the
//! GOOSE trip-rule evaluator and sampled by the closed-loop testers.
//!
//! It has no queue semantics — a 0→1→0 transition between two samples
//! is simply missed. `TripSignal` additionally offers a bounded broadcast
//! of `(tick, rule_name)` edges for callers that cannot tolerate losing
//! one, without weakening the flag itself as the contract.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};

/// An edge event: the rule that caused the flag to be set, and the tick
/// (caller-defined unit) at which it happened.
#[derive(Debug, Clone)]
pub struct TripEdge {
    /// Name of the rule whose evaluation raised the flag.
    pub rule_name: String,
    /// Caller-supplied tick or timestamp identifying when the edge fired.
    pub tick: u64,
}

/// Shared handle to the process-wide trip flag. Clones refer to the same
/// underlying flag; this is the capability object passed into testers
/// per the design note preferring explicit handles over hidden globals.
#[derive(Clone)]
pub struct TripSignal {
    inner: Arc<AtomicBool>,
    edges_tx: Sender<TripEdge>,
    edges_rx: Receiver<TripEdge>,
}

impl TripSignal {
    /// Construct a new, initially-clear trip signal with a bounded edge
    /// broadcast channel of the given capacity.
    #[must_use]
    pub fn new(edge_capacity: usize) -> Self {
        let (edges_tx, edges_rx) = crossbeam_channel::bounded(edge_capacity.max(1));
        Self {
            inner: Arc::new(AtomicBool::new(false)),
            edges_tx,
            edges_rx,
        }
    }

    /// Raise the flag, one-shot until explicitly cleared. Also attempts to
    /// push an edge event; a full edge channel never blocks nor fails the
    /// flag update (the flag remains the contract).
    pub fn set(&self, rule_name: &str, tick: u64) {
        self.inner.store(true, Ordering::SeqCst);
        let _ = self.edges_tx.try_send(TripEdge {
            rule_name: rule_name.to_string(),
            tick,
        });
    }

    /// Clear the flag.
    pub fn clear(&self) {
        self.inner.store(false, Ordering::SeqCst);
    }

    /// Current flag value.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }

    /// Drain any edges queued since the last call, oldest first.
    pub fn drain_edges(&self) -> Vec<TripEdge> {
        self.edges_rx.try_iter().collect()
    }
}

impl Default for TripSignal {
    fn default() -> Self {
        Self::new(16)
    }
}

/// Capability trait for reading the trip flag, so testers can be built
/// against either the process-wide binding or an in-memory test double.
pub trait TripGetter: Send + Sync {
    /// Sample the current flag value.
    fn is_set(&self) -> bool;
    /// Clear the flag.
    fn clear(&self);
}

impl TripGetter for TripSignal {
    fn is_set(&self) -> bool {
        TripSignal::is_set(self)
    }

    fn clear(&self) {
        TripSignal::clear(self);
    }
}
