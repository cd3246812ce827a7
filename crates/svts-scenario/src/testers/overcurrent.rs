//! Overcurrent (IDMT) tester (component L.3): drives a single current
//! channel to `M · I_pickup` and checks the trip flag against the
//! curve's expected operate time.

use std::time::{Duration, Instant};

use svts_common::SvtsResult;
use svts_signal::{ChannelKind, ChannelPhasor};

use super::{PointResult, TesterContext};

/// IDMT curve family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    /// IEC Standard Inverse.
    StandardInverse,
    /// IEC Very Inverse.
    VeryInverse,
    /// IEC Extremely Inverse.
    ExtremelyInverse,
    /// IEC Long Time Inverse.
    LongTimeInverse,
    /// IEEE Moderately Inverse.
    IeeeModeratelyInverse,
    /// IEEE Very Inverse.
    IeeeVeryInverse,
    /// IEEE Extremely Inverse.
    IeeeExtremelyInverse,
    /// Fixed operate time regardless of current.
    DefiniteTime,
    /// Zero operate time (no intentional delay).
    Instantaneous,
}

impl Curve {
    /// Expected operate time in seconds for current multiple `m = I /
    /// I_pickup` at the given time multiplier setting. `None` for `m <=
    /// 1.0` (the curve never operates; spec: "expected time is +inf").
    #[must_use]
    pub fn expected_time_s(self, tms: f64, m: f64) -> Option<f64> {
        if matches!(self, Curve::DefiniteTime) {
            return Some(tms);
        }
        if matches!(self, Curve::Instantaneous) {
            return Some(0.0);
        }
        if m <= 1.0 {
            return None;
        }
        let t = match self {
            Curve::StandardInverse => tms * 0.14 / (m.powf(0.02) - 1.0),
            Curve::VeryInverse => tms * 13.5 / (m - 1.0),
            Curve::ExtremelyInverse => tms * 80.0 / (m.powi(2) - 1.0),
            Curve::LongTimeInverse => tms * 120.0 / (m - 1.0),
            Curve::IeeeModeratelyInverse => tms * (0.0515 / (m.powf(0.02) - 1.0) + 0.114),
            Curve::IeeeVeryInverse => tms * (19.61 / (m.powi(2) - 1.0) + 0.491),
            Curve::IeeeExtremelyInverse => tms * (28.2 / (m.powi(2) - 1.0) + 0.1217),
            Curve::DefiniteTime | Curve::Instantaneous => unreachable!(),
        };
        Some(t)
    }
}

/// One stimulus multiple to apply and observe.
#[derive(Debug, Clone)]
pub struct OvercurrentPoint {
    /// Label surfaced in the result.
    pub label: String,
    /// Current multiple `M = I / I_pickup` to apply.
    pub multiple: f64,
    /// Either an absolute tolerance in seconds (`Absolute(s)`) or a
    /// percentage of the expected time (`Percent(p)`); see
    /// [`Tolerance`].
    pub tolerance: Tolerance,
}

/// Operate-time tolerance mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tolerance {
    /// Fixed number of seconds either side of the expected time.
    Absolute(f64),
    /// Percentage (0.0..=1.0) of the expected time either side.
    Percent(f64),
}

/// Run configuration.
#[derive(Debug, Clone)]
pub struct OvercurrentConfig {
    /// Stream the stimulus current is applied to.
    pub stream_id: String,
    /// Channel driven (typically `IA`).
    pub channel: ChannelKind,
    /// Curve family under test.
    pub curve: Curve,
    /// Time multiplier setting (curve-specific scale factor).
    pub tms: f64,
    /// Pickup current, amperes.
    pub i_pickup: f64,
    /// Points to exercise, in order.
    pub points: Vec<OvercurrentPoint>,
    /// Maximum time to hold a stimulus before declaring no-trip.
    pub max_test_duration: Duration,
}

/// Drives one IDMT curve's verification run.
pub struct OvercurrentTester {
    ctx: TesterContext,
}

impl OvercurrentTester {
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
    pub fn run(&self, config: OvercurrentConfig) -> SvtsResult<Vec<PointResult>> {
        self.ctx.reset_stop();
        let mut results = Vec::with_capacity(config.points.len());

        for point in &config.points {
            if self.ctx.is_stopping() {
                break;
            }

            self.ctx.trip.clear();
            let current = point.multiple * config.i_pickup;
            self.ctx
                .push_phasors(&config.stream_id, &[(config.channel, ChannelPhasor::fundamental(current, 0.0))])?;

            let entry = Instant::now();
            let observed = self.ctx.wait_for_trip_or_timeout(entry, config.max_test_duration, true);

            let tripped = observed.is_some();
            let operate_time_s = observed.map(|d| d.as_secs_f64());
            let expected = config.curve.expected_time_s(config.tms, point.multiple);

            let passed = match (tripped, expected) {
                (false, None) => true,
                (true, Some(expected)) => {
                    let measured = operate_time_s.unwrap();
                    match point.tolerance {
                        Tolerance::Absolute(s) => (measured - expected).abs() <= s,
                        Tolerance::Percent(p) => (measured - expected).abs() <= expected.abs() * p,
                    }
                }
                _ => false,
            };

            results.push(PointResult {
                label: point.label.clone(),
                tripped,
                operate_time_s,
                passed,
            });
        }

        // Leave the channel at zero once the run ends so a subsequent
        // run on the same stream does not inherit a live current.
        self.ctx.push_phasors(&config.stream_id, &[(config.channel, ChannelPhasor::fundamental(0.0, 0.0))])?;

        Ok(results)
    }
}
