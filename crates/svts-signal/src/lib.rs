//! Phasor/harmonic signal model (component C): translates per-channel
//! magnitude/angle/frequency/harmonics into instantaneous INT32 samples.

pub mod channel;
pub mod phasor;

pub use channel::{normalize_angle, ChannelKind, ChannelPhasor, Harmonic, PhasorState, ALL_CHANNELS};
pub use phasor::{sample, CURRENT_COUNTS_PER_UNIT, VOLTAGE_COUNTS_PER_UNIT};
