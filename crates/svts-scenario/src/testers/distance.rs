//! Distance (impedance-plane) tester (component L.2): applies a
//! prefault baseline then a computed fault phasor per point, and times
//! the trip flag's response.

use std::time::{Duration, Instant};

use num_complex::Complex64;
use svts_common::SvtsResult;
use svts_signal::PhasorState;

use crate::impedance::{self, FaultType, SourceImpedance};

use super::{PointResult, TesterContext};

/// One impedance-plane point to drive and observe.
#[derive(Debug, Clone)]
pub struct DistancePoint {
    /// Label surfaced in the result.
    pub label: String,
    /// Fault resistance, ohms.
    pub r: f64,
    /// Fault reactance, ohms.
    pub x: f64,
    /// Fault type applied.
    pub fault_type: FaultType,
    /// Expected trip time, if the point is meant to trip.
    pub expected_time_s: Option<f64>,
}

/// Run configuration for the distance tester.
#[derive(Debug, Clone)]
pub struct DistanceConfig {
    /// Stream the prefault/fault phasors are applied to.
    pub stream_id: String,
    /// Points to exercise, in order.
    pub points: Vec<DistancePoint>,
    /// Source impedance behind the relay.
    pub source: SourceImpedance,
    /// Prefault line-to-neutral voltage magnitude.
    pub prefault_voltage: f64,
    /// System frequency applied to both prefault and fault states.
    pub freq: f64,
    /// Dwell time on the balanced-nominal prefault state before the fault.
    pub prefault_duration: Duration,
    /// Maximum time to hold the fault before declaring no-trip.
    pub fault_duration: Duration,
    /// Absolute tolerance against `expected_time_s`.
    pub time_tolerance: Duration,
    /// Abort the run after the first failing point.
    pub stop_on_first_failure: bool,
}

/// Drives the impedance calculator (4.K) into the publisher manager
/// (4.I) and observes the trip flag (4.F) per point.
pub struct DistanceTester {
    ctx: TesterContext,
}

impl DistanceTester {
    /// Construct a tester bound to the given shared context.
    #[must_use]
    pub fn new(ctx: TesterContext) -> Self {
        Self { ctx }
    }

    /// Request cancellation of an in-progress run.
    pub fn stop(&self) {
        self.ctx.stop();
    }

    /// Run every configured point in order. Blocking.
    pub fn run(&self, config: DistanceConfig) -> SvtsResult<Vec<PointResult>> {
        self.ctx.reset_stop();
        let mut results = Vec::with_capacity(config.points.len());

        for point in &config.points {
            if self.ctx.is_stopping() {
                break;
            }

            let prefault = PhasorState::balanced_nominal(config.freq, config.prefault_voltage);
            self.ctx.push_state(&config.stream_id, &prefault)?;
            self.ctx.trip.clear();
            std::thread::sleep(config.prefault_duration);

            let z_f = Complex64::new(point.r, point.x);
            let fault_state = impedance::compute(point.fault_type, z_f, config.source, config.prefault_voltage, config.freq);
            self.ctx.push_state(&config.stream_id, &fault_state)?;

            let entry = Instant::now();
            let observed = self.ctx.wait_for_trip_or_timeout(entry, config.fault_duration, true);

            let tripped = observed.is_some();
            let operate_time_s = observed.map(|d| d.as_secs_f64());
            let passed = match (tripped, point.expected_time_s) {
                (true, Some(expected)) => (operate_time_s.unwrap() - expected).abs() <= config.time_tolerance.as_secs_f64(),
                (tripped, None) => tripped,
                _ => false,
            };

            let result = PointResult {
                label: point.label.clone(),
                tripped,
                operate_time_s,
                passed,
            };
            let failed = !result.passed;
            results.push(result);

            if failed && config.stop_on_first_failure {
                break;
            }
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use svts_common::config::{StreamConfig, WorkerPoolConfig};
    use svts_common::trip_flag::{TripGetter, TripSignal};
    use svts_runtime::manager::{PublisherManager, SinkBuilder};
    use svts_runtime::pool::WorkerPool;
    use svts_sink::{PacketSink, SimulatedSink};

    fn ctx_with_stream() -> (TesterContext, String, TripSignal) {
        let pool = Arc::new(WorkerPool::new(WorkerPoolConfig { num_workers: 1, queue_capacity: 8, rt_priority: 0, ..Default::default() }).unwrap());
        let builder: SinkBuilder = Arc::new(|_cfg: &StreamConfig| Ok(Box::new(SimulatedSink::new([1, 1, 1, 1, 1, 1])) as Box<dyn PacketSink>));
        let manager = Arc::new(PublisherManager::new(pool, builder, Duration::from_secs(1)));
        let cfg = StreamConfig::default();
        let stream_id = cfg.stream_id.clone();
        manager.create_stream(cfg).unwrap();
        manager.start(&stream_id).unwrap();
        let trip = TripSignal::new(8);
        let trip_dyn: Arc<dyn TripGetter> = Arc::new(trip.clone());
        (TesterContext::new(manager, trip_dyn), stream_id, trip)
    }

    fn source() -> SourceImpedance {
        SourceImpedance { z1: Complex64::new(1.0, 5.0), z0: Complex64::new(2.0, 6.0) }
    }

    #[test]
    fn test_point_without_expected_time_passes_on_any_trip() {
        let (ctx, stream_id, trip) = ctx_with_stream();
        let tester = DistanceTester::new(ctx);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            trip.set("relay", 1);
        });
        let results = tester
            .run(DistanceConfig {
                stream_id,
                points: vec![DistancePoint { label: "p1".into(), r: 0.1, x: 1.0, fault_type: FaultType::Ag, expected_time_s: None }],
                source: source(),
                prefault_voltage: 67.0,
                freq: 60.0,
                prefault_duration: Duration::from_millis(5),
                fault_duration: Duration::from_millis(200),
                time_tolerance: Duration::from_millis(10),
                stop_on_first_failure: false,
            })
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].tripped);
        assert!(results[0].passed);
    }

    #[test]
    fn test_point_times_out_when_relay_never_trips() {
        let (ctx, stream_id, _trip) = ctx_with_stream();
        let tester = DistanceTester::new(ctx);
        let results = tester
            .run(DistanceConfig {
                stream_id,
                points: vec![DistancePoint { label: "p1".into(), r: 0.1, x: 1.0, fault_type: FaultType::Ag, expected_time_s: None }],
                source: source(),
                prefault_voltage: 67.0,
                freq: 60.0,
                prefault_duration: Duration::from_millis(1),
                fault_duration: Duration::from_millis(20),
                time_tolerance: Duration::from_millis(10),
                stop_on_first_failure: false,
            })
            .unwrap();
        assert!(!results[0].tripped);
        assert!(!results[0].passed);
    }

    #[test]
    fn test_stop_on_first_failure_skips_remaining_points() {
        let (ctx, stream_id, _trip) = ctx_with_stream();
        let tester = DistanceTester::new(ctx);
        let points = vec![
            DistancePoint { label: "p1".into(), r: 0.1, x: 1.0, fault_type: FaultType::Ag, expected_time_s: None },
            DistancePoint { label: "p2".into(), r: 0.1, x: 1.0, fault_type: FaultType::Bg, expected_time_s: None },
        ];
        let results = tester
            .run(DistanceConfig {
                stream_id,
                points,
                source: source(),
                prefault_voltage: 67.0,
                freq: 60.0,
                prefault_duration: Duration::from_millis(1),
                fault_duration: Duration::from_millis(10),
                time_tolerance: Duration::from_millis(10),
                stop_on_first_failure: true,
            })
            .unwrap();
        assert_eq!(results.len(), 1);
    }
}
