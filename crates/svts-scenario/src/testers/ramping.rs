//! Ramping tester (component L.1): steps one stimulus variable from a
//! start value toward an end value, recording pickup/dropoff against
//! the trip flag.

use std::time::{Duration, Instant};

use svts_common::{SvtsError, SvtsResult};
use svts_signal::{ChannelKind, ChannelPhasor, PhasorState};

use super::TesterContext;

/// The single quantity a ramp run drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampVariable {
    /// Phase A voltage magnitude only.
    VA,
    /// Phase B voltage magnitude only.
    VB,
    /// Phase C voltage magnitude only.
    VC,
    /// All three phase voltages together, 120° apart.
    V3Ph,
    /// Phase A current magnitude only.
    IA,
    /// Phase B current magnitude only.
    IB,
    /// Phase C current magnitude only.
    IC,
    /// All three phase currents together, 120° apart.
    I3Ph,
    /// System frequency.
    Freq,
}

/// Ramp run configuration.
#[derive(Debug, Clone)]
pub struct RampingConfig {
    /// Stream the ramp is applied to.
    pub stream_id: String,
    /// Which stimulus is driven.
    pub variable: RampVariable,
    /// Starting value (volts, amperes, or Hz, per `variable`).
    pub start_value: f64,
    /// Target value; the run stops once this is reached.
    pub end_value: f64,
    /// Signed step applied once per `step_duration`.
    pub step_size: f64,
    /// Dwell time between steps.
    pub step_duration: Duration,
    /// Whether to watch the trip flag for pickup/dropoff edges.
    pub monitor_trip: bool,
}

/// Outcome of one ramp run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RampingResult {
    /// False if the configuration was rejected (zero or wrong-sign
    /// step) or the run was cancelled before reaching `end_value`.
    pub completed: bool,
    /// `(value, elapsed_s)` at the trip flag's first 0→1 edge.
    pub pickup: Option<(f64, f64)>,
    /// `(value, elapsed_s)` at the trip flag's first 1→0 edge after a
    /// pickup.
    pub dropoff: Option<(f64, f64)>,
    /// `dropoff.0 / pickup.0`, or `0.0` unless both occurred in this run.
    pub reset_ratio: f64,
}

/// Drives a single [`RampVariable`] through [`TesterContext`].
pub struct RampingTester {
    ctx: TesterContext,
}

impl RampingTester {
    /// Construct a tester bound to the given shared context.
    #[must_use]
    pub fn new(ctx: TesterContext) -> Self {
        Self { ctx }
    }

    /// Request cancellation of an in-progress run.
    pub fn stop(&self) {
        self.ctx.stop();
    }

    /// Run a ramp to completion (or cancellation). Blocking.
    pub fn run(&self, config: RampingConfig) -> SvtsResult<RampingResult> {
        self.ctx.reset_stop();

        let rising = config.end_value >= config.start_value;
        let step_ok = if rising {
            config.step_size > 0.0
        } else {
            config.step_size < 0.0
        };
        if !step_ok {
            return Ok(RampingResult { completed: false, ..Default::default() });
        }

        let mut value = config.start_value;
        let mut pickup: Option<(f64, f64)> = None;
        let mut dropoff: Option<(f64, f64)> = None;
        let mut was_tripped = false;
        let run_start = Instant::now();

        loop {
            self.apply(&config.stream_id, config.variable, value)?;

            if config.monitor_trip {
                let is_tripped = self.ctx.trip.is_set();
                if is_tripped && !was_tripped {
                    pickup = Some((value, run_start.elapsed().as_secs_f64()));
                } else if !is_tripped && was_tripped {
                    dropoff = Some((value, run_start.elapsed().as_secs_f64()));
                }
                was_tripped = is_tripped;
            }

            if self.ctx.is_stopping() {
                return Ok(RampingResult { completed: false, pickup, dropoff, reset_ratio: 0.0 });
            }

            let reached_end = if rising { value >= config.end_value } else { value <= config.end_value };
            if reached_end {
                break;
            }

            std::thread::sleep(config.step_duration);
            value += config.step_size;
            // Clamp the final step exactly onto end_value rather than
            // overshooting by a partial step.
            if (rising && value > config.end_value) || (!rising && value < config.end_value) {
                value = config.end_value;
            }
        }

        let reset_ratio = match (pickup, dropoff) {
            (Some((p, _)), Some((d, _))) if p != 0.0 => d / p,
            _ => 0.0,
        };

        Ok(RampingResult { completed: true, pickup, dropoff, reset_ratio })
    }

    fn apply(&self, stream_id: &str, variable: RampVariable, value: f64) -> SvtsResult<()> {
        use std::f64::consts::PI;

        match variable {
            RampVariable::VA => self.ctx.push_phasors(stream_id, &[(ChannelKind::VA, ChannelPhasor::fundamental(value, 0.0))]),
            RampVariable::VB => self.ctx.push_phasors(stream_id, &[(ChannelKind::VB, ChannelPhasor::fundamental(value, 0.0))]),
            RampVariable::VC => self.ctx.push_phasors(stream_id, &[(ChannelKind::VC, ChannelPhasor::fundamental(value, 0.0))]),
            RampVariable::IA => self.ctx.push_phasors(stream_id, &[(ChannelKind::IA, ChannelPhasor::fundamental(value, 0.0))]),
            RampVariable::IB => self.ctx.push_phasors(stream_id, &[(ChannelKind::IB, ChannelPhasor::fundamental(value, 0.0))]),
            RampVariable::IC => self.ctx.push_phasors(stream_id, &[(ChannelKind::IC, ChannelPhasor::fundamental(value, 0.0))]),
            RampVariable::V3Ph => self.ctx.push_phasors(
                stream_id,
                &[
                    (ChannelKind::VA, ChannelPhasor::fundamental(value, 0.0)),
                    (ChannelKind::VB, ChannelPhasor::fundamental(value, -2.0 * PI / 3.0)),
                    (ChannelKind::VC, ChannelPhasor::fundamental(value, 2.0 * PI / 3.0)),
                ],
            ),
            RampVariable::I3Ph => self.ctx.push_phasors(
                stream_id,
                &[
                    (ChannelKind::IA, ChannelPhasor::fundamental(value, 0.0)),
                    (ChannelKind::IB, ChannelPhasor::fundamental(value, -2.0 * PI / 3.0)),
                    (ChannelKind::IC, ChannelPhasor::fundamental(value, 2.0 * PI / 3.0)),
                ],
            ),
            RampVariable::Freq => self.apply_freq(stream_id, value),
        }
    }

    fn apply_freq(&self, stream_id: &str, value: f64) -> SvtsResult<()> {
        let publisher = self
            .ctx
            .manager
            .get(stream_id)
            .ok_or_else(|| SvtsError::ConfigInvalid(format!("stream '{stream_id}' not found")))?;
        let mut config = (*publisher.config()).clone();
        config.nominal_freq = value;
        self.ctx.manager.update_config(stream_id, config)
    }
}

/// Convenience for testers and tests wanting a zero-harmonic baseline.
#[must_use]
pub fn flat_state(freq: f64) -> PhasorState {
    PhasorState::flat(freq)
}
