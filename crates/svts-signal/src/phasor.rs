//! Phasor synthesizer (component C): one int32 sample of a channel at
//! sample index `k`, time-domain exact against the current phasor state.

use std::f64::consts::TAU;

use crate::channel::{ChannelKind, ChannelPhasor};

/// 9-2LE voltage scaling: 1 count = 10 uV.
pub const VOLTAGE_COUNTS_PER_UNIT: f64 = 1e5;
/// 9-2LE current scaling: 1 count = 1 mA.
pub const CURRENT_COUNTS_PER_UNIT: f64 = 1e3;

/// Compute one int32 sample of `channel` at tick `k` and `sample_rate`
/// (samples/second), given the channel's current fundamental + harmonic
/// content and the stream's instantaneous frequency.
///
/// `t = k / sample_rate`; the fundamental contributes at harmonic order
/// 1, harmonics at their declared order, each with magnitude expressed
/// as a fraction of the fundamental. No filtering or anti-aliasing is
/// applied — the model is exact for the phasor state as given.
#[must_use]
pub fn sample(kind: ChannelKind, channel: &ChannelPhasor, freq: f64, k: u64, sample_rate: u32) -> i32 {
    let t = k as f64 / f64::from(sample_rate);
    let mut value = channel.magnitude * (TAU * freq * t + channel.angle_rad).cos();
    for h in &channel.harmonics {
        let h_mag = channel.magnitude * h.magnitude_rel;
        value += h_mag * (TAU * f64::from(h.order) * freq * t + h.angle_rad).cos();
    }

    let scale = if kind.is_voltage() {
        VOLTAGE_COUNTS_PER_UNIT
    } else {
        CURRENT_COUNTS_PER_UNIT
    };
    let counts = value * scale;

    if counts >= f64::from(i32::MAX) {
        i32::MAX
    } else if counts <= f64::from(i32::MIN) {
        i32::MIN
    } else {
        counts.round() as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Harmonic;

    #[test]
    fn test_fundamental_peak_at_t_zero() {
        let ch = ChannelPhasor::fundamental(100.0, 0.0);
        let v = sample(ChannelKind::VA, &ch, 60.0, 0, 4800);
        assert_eq!(v, (100.0 * VOLTAGE_COUNTS_PER_UNIT).round() as i32);
    }

    #[test]
    fn test_current_uses_milliamp_scaling() {
        let ch = ChannelPhasor::fundamental(10.0, 0.0);
        let v = sample(ChannelKind::IA, &ch, 60.0, 0, 4800);
        assert_eq!(v, (10.0 * CURRENT_COUNTS_PER_UNIT).round() as i32);
    }

    #[test]
    fn test_quarter_period_is_near_zero_crossing() {
        let ch = ChannelPhasor::fundamental(100.0, 0.0);
        let sample_rate = 4800u32;
        let quarter_period_samples = (sample_rate as f64 / 60.0 / 4.0).round() as u64;
        let v = sample(ChannelKind::VA, &ch, 60.0, quarter_period_samples, sample_rate);
        assert!(v.abs() < (1.0 * VOLTAGE_COUNTS_PER_UNIT) as i32);
    }

    #[test]
    fn test_saturation_at_int32_limits() {
        let ch = ChannelPhasor::fundamental(1e9, 0.0);
        let v = sample(ChannelKind::VA, &ch, 60.0, 0, 4800);
        assert_eq!(v, i32::MAX);
    }

    #[test]
    fn test_harmonic_adds_ripple() {
        let mut ch = ChannelPhasor::fundamental(100.0, 0.0);
        ch.set_harmonics(vec![Harmonic::new(3, 0.1, 0.0).unwrap()]);
        let sample_rate = 4800u32;
        // At a point where the fundamental alone would be zero, the
        // harmonic contributes a nonzero ripple.
        let quarter = (sample_rate as f64 / 60.0 / 4.0).round() as u64;
        let with_harmonics = sample(ChannelKind::VA, &ch, 60.0, quarter, sample_rate);
        let fundamental_only = ChannelPhasor::fundamental(100.0, 0.0);
        let without = sample(ChannelKind::VA, &fundamental_only, 60.0, quarter, sample_rate);
        assert_ne!(with_harmonics, without);
    }

    #[test]
    fn test_mid_stream_state_change_visible_next_tick() {
        // The synthesizer is a pure function of (channel, k) — a state
        // change between calls is observed immediately on the next call,
        // matching the "apparent latency of at most one tick" invariant.
        let a = ChannelPhasor::fundamental(100.0, 0.0);
        let b = ChannelPhasor::fundamental(200.0, 0.0);
        let va = sample(ChannelKind::VA, &a, 60.0, 0, 4800);
        let vb = sample(ChannelKind::VA, &b, 60.0, 0, 4800);
        assert_ne!(va, vb);
    }
}
