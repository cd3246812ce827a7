//! Closed-loop testers (component L): ramping, distance, overcurrent,
//! and differential, all built on one shared template.

pub mod differential;
pub mod distance;
pub mod overcurrent;
pub mod ramping;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use svts_common::trip_flag::TripGetter;
use svts_common::SvtsResult;
use svts_runtime::manager::PublisherManager;
use svts_signal::{ChannelKind, ChannelPhasor, PhasorState};

pub use differential::{DifferentialConfig, DifferentialPoint, DifferentialTester};
pub use distance::{DistanceConfig, DistancePoint, DistanceTester};
pub use overcurrent::{Curve, OvercurrentConfig, OvercurrentPoint, OvercurrentTester, Tolerance};
pub use ramping::{RampVariable, RampingConfig, RampingResult, RampingTester};

/// How often a tester's blocking run loop polls the trip flag and its
/// own stop flag while waiting out a dwell or fault-duration window.
pub const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Value setter + trip getter + cooperative stop, shared by every
/// tester; every concrete tester is built on this shared shape.
#[derive(Clone)]
pub struct TesterContext {
    pub(crate) manager: Arc<PublisherManager>,
    pub(crate) trip: Arc<dyn TripGetter>,
    stop_flag: Arc<AtomicBool>,
}

impl TesterContext {
    /// Construct a context bound to the given publisher manager and
    /// trip-flag reader.
    #[must_use]
    pub fn new(manager: Arc<PublisherManager>, trip: Arc<dyn TripGetter>) -> Self {
        Self {
            manager,
            trip,
            stop_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation of any in-progress run; checked at each
    /// step boundary.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }

    /// Whether `stop()` has been requested. A fresh `run()` should
    /// clear this first if the context is reused.
    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.stop_flag.load(Ordering::Relaxed)
    }

    pub(crate) fn reset_stop(&self) {
        self.stop_flag.store(false, Ordering::Relaxed);
    }

    pub(crate) fn push_phasors(&self, stream_id: &str, partial: &[(ChannelKind, ChannelPhasor)]) -> SvtsResult<()> {
        self.manager.update_phasors(stream_id, partial)
    }

    pub(crate) fn push_state(&self, stream_id: &str, state: &PhasorState) -> SvtsResult<()> {
        let partial: Vec<_> = svts_signal::ALL_CHANNELS.iter().map(|&k| (k, state.get(k).clone())).collect();
        self.manager.update_phasors(stream_id, &partial)
    }

    /// Block, polling the trip flag and stop flag every
    /// [`POLL_INTERVAL`], until `deadline` elapses or the trip flag's
    /// 0→1 edge fires (if `watch_trip`). Returns the elapsed time at
    /// which the trip was observed, or `None` on timeout/cancellation.
    pub(crate) fn wait_for_trip_or_timeout(&self, entry: Instant, duration: Duration, watch_trip: bool) -> Option<Duration> {
        loop {
            if self.is_stopping() {
                return None;
            }
            if watch_trip && self.trip.is_set() {
                return Some(entry.elapsed());
            }
            if entry.elapsed() >= duration {
                return None;
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Pass/fail outcome shared by distance, overcurrent, and differential
/// points: `operate_time_s` is `None` when the point never tripped.
#[derive(Debug, Clone, PartialEq)]
pub struct PointResult {
    /// Label carried through from the input point.
    pub label: String,
    /// Whether the relay tripped within the observation window.
    pub tripped: bool,
    /// Elapsed time from fault entry to the trip flag's 0→1 edge.
    pub operate_time_s: Option<f64>,
    /// Whether this point's outcome matched expectation.
    pub passed: bool,
}
