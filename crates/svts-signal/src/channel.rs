//! Channel identity and the per-stream phasor state (data model §3).

use serde::{Deserialize, Serialize};
use svts_common::{SvtsError, SvtsResult};
use std::f64::consts::PI;

/// One of the eight conventional 9-2LE channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelKind {
    /// Phase A voltage.
    VA,
    /// Phase B voltage.
    VB,
    /// Phase C voltage.
    VC,
    /// Neutral voltage.
    VN,
    /// Phase A current.
    IA,
    /// Phase B current.
    IB,
    /// Phase C current.
    IC,
    /// Neutral current.
    IN,
}

/// All eight channels in declared wire order.
pub const ALL_CHANNELS: [ChannelKind; 8] = [
    ChannelKind::VA,
    ChannelKind::VB,
    ChannelKind::VC,
    ChannelKind::VN,
    ChannelKind::IA,
    ChannelKind::IB,
    ChannelKind::IC,
    ChannelKind::IN,
];

impl ChannelKind {
    /// Position of this channel in the declared channel order.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            ChannelKind::VA => 0,
            ChannelKind::VB => 1,
            ChannelKind::VC => 2,
            ChannelKind::VN => 3,
            ChannelKind::IA => 4,
            ChannelKind::IB => 5,
            ChannelKind::IC => 6,
            ChannelKind::IN => 7,
        }
    }

    /// Whether this channel carries a voltage (vs. a current) quantity,
    /// selecting the 9-2LE scaling constant in [`crate::phasor`].
    #[must_use]
    pub fn is_voltage(self) -> bool {
        matches!(self, ChannelKind::VA | ChannelKind::VB | ChannelKind::VC | ChannelKind::VN)
    }
}

/// Normalize an angle in radians to `(-pi, pi]`.
#[must_use]
pub fn normalize_angle(angle: f64) -> f64 {
    let mut a = angle % (2.0 * PI);
    if a <= -PI {
        a += 2.0 * PI;
    } else if a > PI {
        a -= 2.0 * PI;
    }
    a
}

/// One harmonic component: order (2..=50), magnitude as a fraction of the
/// fundamental, and phase angle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Harmonic {
    /// Harmonic order, 2..=50.
    pub order: u8,
    /// Magnitude relative to the fundamental (fraction, not percent).
    pub magnitude_rel: f64,
    /// Phase angle in radians.
    pub angle_rad: f64,
}

impl Harmonic {
    /// Construct and validate a harmonic component.
    pub fn new(order: u8, magnitude_rel: f64, angle_rad: f64) -> SvtsResult<Self> {
        if !(2..=50).contains(&order) {
            return Err(SvtsError::ConfigInvalid(format!(
                "harmonic order {order} out of range 2..=50"
            )));
        }
        if magnitude_rel < 0.0 {
            return Err(SvtsError::ConfigInvalid(
                "harmonic magnitude must be non-negative".into(),
            ));
        }
        Ok(Self {
            order,
            magnitude_rel,
            angle_rad: normalize_angle(angle_rad),
        })
    }
}

/// Fundamental magnitude/angle plus an ordered harmonic set for one
/// channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelPhasor {
    /// Primary-side magnitude (volts or amperes).
    pub magnitude: f64,
    /// Fundamental phase angle in radians, normalized to `(-pi, pi]`.
    pub angle_rad: f64,
    /// Harmonic components, ordered by `order`.
    pub harmonics: Vec<Harmonic>,
}

impl ChannelPhasor {
    /// Construct a purely-fundamental phasor with no harmonics.
    #[must_use]
    pub fn fundamental(magnitude: f64, angle_rad: f64) -> Self {
        Self {
            magnitude: magnitude.max(0.0),
            angle_rad: normalize_angle(angle_rad),
            harmonics: Vec::new(),
        }
    }

    /// Replace the harmonic set, per `updateHarmonics`.
    pub fn set_harmonics(&mut self, harmonics: Vec<Harmonic>) {
        self.harmonics = harmonics;
    }
}

/// Complete per-stream phasor state: system frequency plus all eight
/// channels' fundamental + harmonic content. Immutable once built;
/// writers construct a new snapshot and swap it in (§5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhasorState {
    /// System frequency in Hz.
    pub freq: f64,
    /// Per-channel phasor content, indexed by [`ChannelKind::index`].
    pub channels: [ChannelPhasor; 8],
}

impl PhasorState {
    /// A flat state at the given frequency with all channels at zero.
    #[must_use]
    pub fn flat(freq: f64) -> Self {
        Self {
            freq,
            channels: Default::default(),
        }
    }

    /// Balanced three-phase nominal state: unity-magnitude voltages at
    /// 0/-120/+120 degrees, zero currents. A convenient prefault baseline
    /// for the closed-loop testers.
    #[must_use]
    pub fn balanced_nominal(freq: f64, voltage_magnitude: f64) -> Self {
        let mut s = Self::flat(freq);
        s.set(ChannelKind::VA, ChannelPhasor::fundamental(voltage_magnitude, 0.0));
        s.set(
            ChannelKind::VB,
            ChannelPhasor::fundamental(voltage_magnitude, normalize_angle(-2.0 * PI / 3.0)),
        );
        s.set(
            ChannelKind::VC,
            ChannelPhasor::fundamental(voltage_magnitude, normalize_angle(2.0 * PI / 3.0)),
        );
        s
    }

    /// Read one channel's phasor.
    #[must_use]
    pub fn get(&self, kind: ChannelKind) -> &ChannelPhasor {
        &self.channels[kind.index()]
    }

    /// Write one channel's phasor.
    pub fn set(&mut self, kind: ChannelKind, phasor: ChannelPhasor) {
        self.channels[kind.index()] = phasor;
    }

    /// Merge only the specified channels into a copy of this state,
    /// leaving the rest unchanged — the semantics of `updatePhasors`.
    #[must_use]
    pub fn with_merged(&self, partial: &[(ChannelKind, ChannelPhasor)]) -> Self {
        let mut next = self.clone();
        for (kind, phasor) in partial {
            next.set(*kind, phasor.clone());
        }
        next
    }
}
