//! Differential tester (component L.4): splits each `(restraint,
//! differential)` point into the two stimulus currents the relay's two
//! CT inputs see, and times the trip response.

use std::time::{Duration, Instant};

use svts_common::SvtsResult;
use svts_signal::{ChannelKind, ChannelPhasor};

use super::{PointResult, TesterContext};

/// One restraint/differential operating point.
#[derive(Debug, Clone)]
pub struct DifferentialPoint {
    /// Label surfaced in the result.
    pub label: String,
    /// Restraint current, `I_r`.
    pub i_restraint: f64,
    /// Differential current, `I_d`.
    pub i_differential: f64,
    /// Whether this point is expected to trip (used only to judge pass/fail).
    pub expect_trip: bool,
}

/// Run configuration for the differential tester.
#[derive(Debug, Clone)]
pub struct DifferentialConfig {
    /// Stream carrying the first CT input, driven on `channel_1`.
    pub stream_id: String,
    /// Channel the first stimulus (`I_s1`) is applied to.
    pub channel_1: ChannelKind,
    /// Channel the second stimulus (`I_s2`) is applied to.
    pub channel_2: ChannelKind,
    /// Points to exercise, in order.
    pub points: Vec<DifferentialPoint>,
    /// Maximum time to hold a stimulus before declaring no-trip.
    pub max_test_duration: Duration,
}

/// Drives the two-CT differential stimulus split and observes the trip
/// flag per point.
pub struct DifferentialTester {
    ctx: TesterContext,
}

impl DifferentialTester {
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
    pub fn run(&self, config: DifferentialConfig) -> SvtsResult<Vec<PointResult>> {
        self.ctx.reset_stop();
        let mut results = Vec::with_capacity(config.points.len());

        for point in &config.points {
            if self.ctx.is_stopping() {
                break;
            }

            self.ctx.trip.clear();
            let i_s1 = point.i_restraint + point.i_differential / 2.0;
            let i_s2 = point.i_restraint - point.i_differential / 2.0;
            self.ctx.push_phasors(
                &config.stream_id,
                &[
                    (config.channel_1, ChannelPhasor::fundamental(i_s1, 0.0)),
                    (config.channel_2, ChannelPhasor::fundamental(i_s2, 0.0)),
                ],
            )?;

            let entry = Instant::now();
            let observed = self.ctx.wait_for_trip_or_timeout(entry, config.max_test_duration, true);
            let tripped = observed.is_some();

            results.push(PointResult {
                label: point.label.clone(),
                tripped,
                operate_time_s: observed.map(|d| d.as_secs_f64()),
                passed: tripped == point.expect_trip,
            });
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    #[test]
    fn test_stimulus_split_applied_to_both_channels() {
        let (ctx, stream_id, _trip) = ctx_with_stream();
        let manager = ctx.manager.clone();
        let tester = DifferentialTester::new(ctx);
        let _ = tester.run(DifferentialConfig {
            stream_id: stream_id.clone(),
            channel_1: ChannelKind::IA,
            channel_2: ChannelKind::IB,
            points: vec![DifferentialPoint { label: "p1".into(), i_restraint: 10.0, i_differential: 4.0, expect_trip: false }],
            max_test_duration: Duration::from_millis(10),
        });
        let state = manager.phasor_state(&stream_id).unwrap();
        assert_eq!(state.get(ChannelKind::IA).magnitude, 12.0);
        assert_eq!(state.get(ChannelKind::IB).magnitude, 8.0);
    }

    #[test]
    fn test_no_trip_point_expecting_no_trip_passes() {
        let (ctx, stream_id, _trip) = ctx_with_stream();
        let tester = DifferentialTester::new(ctx);
        let results = tester
            .run(DifferentialConfig {
                stream_id,
                channel_1: ChannelKind::IA,
                channel_2: ChannelKind::IB,
                points: vec![DifferentialPoint { label: "p1".into(), i_restraint: 10.0, i_differential: 0.1, expect_trip: false }],
                max_test_duration: Duration::from_millis(10),
            })
            .unwrap();
        assert!(results[0].passed);
    }
}
