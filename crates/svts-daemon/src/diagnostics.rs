//! Health reporting and Prometheus-style metrics export for the daemon
//! process (counters aggregated across every managed stream and GOOSE
//! subscriber, not per-instance).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

/// Coarse health classification surfaced to an operator or orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Everything nominal.
    Healthy,
    /// Running but with a nonzero missed-tick or parse-error rate.
    Degraded,
    /// No active stream or subscriber is making progress.
    Unhealthy,
    /// Process has not finished initial startup.
    Starting,
    /// Shutdown has been requested; draining in progress.
    ShuttingDown,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Starting => "starting",
            HealthStatus::ShuttingDown => "shutting_down",
        };
        write!(f, "{s}")
    }
}

/// A point-in-time view of the daemon's counters, ready to format.
#[derive(Debug, Clone)]
pub struct DiagnosticsSnapshot {
    /// Overall health classification.
    pub health: HealthStatus,
    /// Total SV ticks published across every stream.
    pub sv_ticks: u64,
    /// Total missed SV deadlines across every stream.
    pub sv_missed_ticks: u64,
    /// Total GOOSE PDUs decoded across every subscriber.
    pub goose_pdus_decoded: u64,
    /// Total malformed GOOSE frames dropped across every subscriber.
    pub goose_parse_errors: u64,
    /// Total trip-rule matches that raised the trip signal.
    pub trips_raised: u64,
    /// Wall-clock time since the daemon started.
    pub uptime_secs: u64,
}

/// Process-wide atomic counters updated by the main loop as it polls
/// each managed stream's and subscriber's runtime counters.
#[derive(Debug)]
pub struct DiagnosticsState {
    sv_ticks: AtomicU64,
    sv_missed_ticks: AtomicU64,
    goose_pdus_decoded: AtomicU64,
    goose_parse_errors: AtomicU64,
    trips_raised: AtomicU64,
    shutting_down: AtomicBool,
    start_time: Instant,
}

impl Default for DiagnosticsState {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticsState {
    /// Construct a fresh state, clock started now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sv_ticks: AtomicU64::new(0),
            sv_missed_ticks: AtomicU64::new(0),
            goose_pdus_decoded: AtomicU64::new(0),
            goose_parse_errors: AtomicU64::new(0),
            trips_raised: AtomicU64::new(0),
            shutting_down: AtomicBool::new(false),
            start_time: Instant::now(),
        }
    }

    /// Replace the SV tick/missed-tick totals with a fresh poll of every
    /// managed stream's cycle metrics.
    pub fn record_sv_totals(&self, ticks: u64, missed: u64) {
        self.sv_ticks.store(ticks, Ordering::Relaxed);
        self.sv_missed_ticks.store(missed, Ordering::Relaxed);
    }

    /// Replace the GOOSE decode/parse-error totals with a fresh poll of
    /// every managed subscriber's runtime counters.
    pub fn record_goose_totals(&self, decoded: u64, parse_errors: u64) {
        self.goose_pdus_decoded.store(decoded, Ordering::Relaxed);
        self.goose_parse_errors.store(parse_errors, Ordering::Relaxed);
    }

    /// Record that the trip signal fired once more.
    pub fn record_trip(&self) {
        self.trips_raised.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark the process as draining.
    pub fn set_shutting_down(&self) {
        self.shutting_down.store(true, Ordering::Relaxed);
    }

    /// Wall-clock uptime since construction.
    #[must_use]
    pub fn uptime(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }
}

/// Turns [`DiagnosticsState`] into a [`DiagnosticsSnapshot`], applying
/// the health classification rule.
pub struct DiagnosticsCollector {
    state: std::sync::Arc<DiagnosticsState>,
    started: AtomicBool,
}

/// Above this missed-tick-to-total ratio, health degrades from Healthy.
const DEGRADED_MISS_RATIO: f64 = 0.01;

impl DiagnosticsCollector {
    /// Construct a collector over the given shared state.
    #[must_use]
    pub fn new(state: std::sync::Arc<DiagnosticsState>) -> Self {
        Self {
            state,
            started: AtomicBool::new(false),
        }
    }

    /// Mark startup complete; until this is called, `snapshot()` always
    /// reports [`HealthStatus::Starting`].
    pub fn mark_started(&self) {
        self.started.store(true, Ordering::Relaxed);
    }

    fn health(&self) -> HealthStatus {
        if self.state.shutting_down.load(Ordering::Relaxed) {
            return HealthStatus::ShuttingDown;
        }
        if !self.started.load(Ordering::Relaxed) {
            return HealthStatus::Starting;
        }
        let ticks = self.state.sv_ticks.load(Ordering::Relaxed);
        let missed = self.state.sv_missed_ticks.load(Ordering::Relaxed);
        let parse_errors = self.state.goose_parse_errors.load(Ordering::Relaxed);
        if ticks == 0 {
            return HealthStatus::Healthy;
        }
        let miss_ratio = missed as f64 / ticks as f64;
        if miss_ratio > DEGRADED_MISS_RATIO || parse_errors > 0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    /// Produce a snapshot of the current counters.
    #[must_use]
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            health: self.health(),
            sv_ticks: self.state.sv_ticks.load(Ordering::Relaxed),
            sv_missed_ticks: self.state.sv_missed_ticks.load(Ordering::Relaxed),
            goose_pdus_decoded: self.state.goose_pdus_decoded.load(Ordering::Relaxed),
            goose_parse_errors: self.state.goose_parse_errors.load(Ordering::Relaxed),
            trips_raised: self.state.trips_raised.load(Ordering::Relaxed),
            uptime_secs: self.state.uptime().as_secs(),
        }
    }

    /// The underlying shared state, for the main loop to update.
    #[must_use]
    pub fn state(&self) -> &std::sync::Arc<DiagnosticsState> {
        &self.state
    }
}

/// Render a snapshot as Prometheus text-exposition output.
#[must_use]
pub fn format_prometheus_metrics(snapshot: &DiagnosticsSnapshot) -> String {
    let health_value = match snapshot.health {
        HealthStatus::Healthy => 0,
        HealthStatus::Degraded => 1,
        HealthStatus::Unhealthy => 2,
        HealthStatus::Starting => 3,
        HealthStatus::ShuttingDown => 4,
    };
    format!(
        "# HELP svts_health Daemon health (0=healthy,1=degraded,2=unhealthy,3=starting,4=shutting_down)\n\
         # TYPE svts_health gauge\n\
         svts_health {health_value}\n\
         # HELP svts_sv_ticks_total Total SV samples published across all streams\n\
         # TYPE svts_sv_ticks_total counter\n\
         svts_sv_ticks_total {}\n\
         # HELP svts_sv_missed_ticks_total Total missed SV publish deadlines\n\
         # TYPE svts_sv_missed_ticks_total counter\n\
         svts_sv_missed_ticks_total {}\n\
         # HELP svts_goose_pdus_decoded_total Total GOOSE PDUs decoded\n\
         # TYPE svts_goose_pdus_decoded_total counter\n\
         svts_goose_pdus_decoded_total {}\n\
         # HELP svts_goose_parse_errors_total Total malformed GOOSE frames dropped\n\
         # TYPE svts_goose_parse_errors_total counter\n\
         svts_goose_parse_errors_total {}\n\
         # HELP svts_trips_raised_total Total trip-rule matches\n\
         # TYPE svts_trips_raised_total counter\n\
         svts_trips_raised_total {}\n\
         # HELP svts_uptime_seconds Process uptime\n\
         # TYPE svts_uptime_seconds gauge\n\
         svts_uptime_seconds {}\n",
        snapshot.sv_ticks,
        snapshot.sv_missed_ticks,
        snapshot.goose_pdus_decoded,
        snapshot.goose_parse_errors,
        snapshot.trips_raised,
        snapshot.uptime_secs,
    )
}
