//! Fault impedance calculator (component K): a pure function from
//! `(fault_type, Z_f, Z_s, V_prefault)` to the complete driving
//! `PhasorState`, via a simple Thevenin / symmetrical-components model.
//! No I/O.

use std::f64::consts::PI;

use num_complex::Complex64;
use svts_signal::{ChannelKind, ChannelPhasor, PhasorState};

/// Sequence operator, `1 ∠ 120°`.
fn alpha() -> Complex64 {
    Complex64::from_polar(1.0, 2.0 * PI / 3.0)
}

/// The ten fault types this calculator supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultType {
    /// Phase A to ground.
    Ag,
    /// Phase B to ground.
    Bg,
    /// Phase C to ground.
    Cg,
    /// Phase A to phase B.
    Ab,
    /// Phase B to phase C.
    Bc,
    /// Phase C to phase A.
    Ca,
    /// Phases A and B to ground.
    Abg,
    /// Phases B and C to ground.
    Bcg,
    /// Phases C and A to ground.
    Cag,
    /// Balanced three-phase.
    Abc,
}

/// Source impedance seen at the relay terminals. The formulas this
/// calculator implements assume a symmetric static source
/// (`Z_s2 = Z_s1`), so only the positive- and zero-sequence values are
/// needed; see `DESIGN.md` for the reasoning.
#[derive(Debug, Clone, Copy)]
pub struct SourceImpedance {
    /// Positive-sequence source impedance (also used as negative-sequence).
    pub z1: Complex64,
    /// Zero-sequence source impedance.
    pub z0: Complex64,
}

/// Complex per-phase result: magnitude/angle pairs ready to drop into a
/// [`PhasorState`].
#[derive(Debug, Clone, Copy)]
struct Triplet {
    a: Complex64,
    b: Complex64,
    c: Complex64,
}

/// Cyclic rotation applied to a generic "prime-frame" result to place
/// its distinguished phase (the faulted phase for ground faults, the
/// healthy phase for phase-to-phase faults) onto the real A, B, or C
/// phase.
#[derive(Debug, Clone, Copy)]
enum Rotation {
    /// Prime frame already aligned with A/B/C.
    Identity,
    /// Prime-a -> real B, prime-b -> real C, prime-c -> real A.
    One,
    /// Prime-a -> real C, prime-b -> real A, prime-c -> real B.
    Two,
}

fn rotate(t: Triplet, rotation: Rotation) -> Triplet {
    match rotation {
        Rotation::Identity => t,
        Rotation::One => Triplet { a: t.c, b: t.a, c: t.b },
        Rotation::Two => Triplet { a: t.b, b: t.c, c: t.a },
    }
}

/// Single-line-to-ground fault, computed with phase A as the generic
/// "prime" faulted phase.
fn ground_fault_primed(v_pf: Complex64, z_f: Complex64, z_s: SourceImpedance) -> (Triplet, Triplet) {
    let a = alpha();
    let ia1 = v_pf / (z_s.z1 * 2.0 + z_s.z0 + z_f * 3.0);
    let ia2 = ia1;
    let ia0 = ia1;
    let ia = ia1 + ia2 + ia0;

    let va1 = v_pf - ia1 * z_s.z1;
    let va2 = -ia2 * z_s.z1;
    let va0 = -ia0 * z_s.z0;
    let va = va0 + va1 + va2;
    let vb = va0 + a * a * va1 + a * va2;
    let vc = va0 + a * va1 + a * a * va2;

    (
        Triplet { a: ia, b: Complex64::new(0.0, 0.0), c: Complex64::new(0.0, 0.0) },
        Triplet { a: va, b: vb, c: vc },
    )
}

/// Phase-to-phase fault (no ground), phase A as the generic "prime"
/// healthy phase, B-C as the generic faulted pair.
fn phase_phase_primed(v_pf: Complex64, z_f: Complex64, z_s: SourceImpedance) -> (Triplet, Triplet) {
    let a = alpha();
    let ia1 = v_pf / (z_s.z1 * 2.0 + z_f);
    let ia2 = -ia1;
    let ia = ia1 + ia2; // == 0

    let va1 = v_pf - ia1 * z_s.z1;
    let va2 = -ia2 * z_s.z1;
    let va = va1 + va2;
    let vb = a * a * va1 + a * va2;
    let vc = a * va1 + a * a * va2;

    (
        Triplet { a: ia, b: a * a * ia1 + a * ia2, c: a * ia1 + a * a * ia2 },
        Triplet { a: va, b: vb, c: vc },
    )
}

/// Two-phase-to-ground fault, phase A as the generic "prime" healthy
/// phase, B-C-G as the generic faulted pair. The healthy phase carries
/// only positive-sequence current (`Ia1`); `Ia2`/`Ia0` split between
/// the two faulted phases by the usual parallel zero/negative-sequence
/// combination.
fn two_phase_ground_primed(v_pf: Complex64, z_f: Complex64, z_s: SourceImpedance) -> (Triplet, Triplet) {
    let a = alpha();
    let z0f = z_s.z0 + z_f * 3.0;
    let parallel = (z_s.z1 * z0f) / (z_s.z1 + z0f);
    let ia1 = v_pf / (z_s.z1 + parallel);
    let v1 = v_pf - ia1 * z_s.z1;
    let ia2 = -v1 / z_s.z1;
    let ia0 = -v1 / z0f;

    let va1 = v1;
    let va2 = v1;
    let va0 = v1;

    let ia = ia0 + ia1 + ia2;
    let ib = ia0 + a * a * ia1 + a * ia2;
    let ic = ia0 + a * ia1 + a * a * ia2;
    let va = va0 + va1 + va2;
    let vb = va0 + a * a * va1 + a * va2;
    let vc = va0 + a * va1 + a * a * va2;

    (Triplet { a: ia, b: ib, c: ic }, Triplet { a: va, b: vb, c: vc })
}

fn balanced_three_phase(v_pf: Complex64, z_f: Complex64, z_s: SourceImpedance) -> (Triplet, Triplet) {
    let a = alpha();
    let ia = v_pf / (z_s.z1 + z_f);
    let ib = a * a * ia;
    let ic = a * ia;
    let va = ia * z_f;
    let vb = a * a * va;
    let vc = a * va;
    (Triplet { a: ia, b: ib, c: ic }, Triplet { a: va, b: vb, c: vc })
}

fn to_phasor(c: Complex64) -> ChannelPhasor {
    ChannelPhasor::fundamental(c.norm(), c.arg())
}

/// Compute the complete driving phasor state for one fault application.
/// `v_prefault` is the prefault line-to-neutral voltage magnitude,
/// common to all three phases (a balanced prefault system is assumed).
#[must_use]
pub fn compute(
    fault_type: FaultType,
    z_f: Complex64,
    z_s: SourceImpedance,
    v_prefault: f64,
    freq: f64,
) -> PhasorState {
    let v_pf = Complex64::new(v_prefault, 0.0);

    let (currents, voltages) = match fault_type {
        FaultType::Ag => {
            let (i, v) = ground_fault_primed(v_pf, z_f, z_s);
            (rotate(i, Rotation::Identity), rotate(v, Rotation::Identity))
        }
        FaultType::Bg => {
            let (i, v) = ground_fault_primed(v_pf, z_f, z_s);
            (rotate(i, Rotation::One), rotate(v, Rotation::One))
        }
        FaultType::Cg => {
            let (i, v) = ground_fault_primed(v_pf, z_f, z_s);
            (rotate(i, Rotation::Two), rotate(v, Rotation::Two))
        }
        FaultType::Bc => {
            let (i, v) = phase_phase_primed(v_pf, z_f, z_s);
            (rotate(i, Rotation::Identity), rotate(v, Rotation::Identity))
        }
        FaultType::Ca => {
            let (i, v) = phase_phase_primed(v_pf, z_f, z_s);
            (rotate(i, Rotation::One), rotate(v, Rotation::One))
        }
        FaultType::Ab => {
            let (i, v) = phase_phase_primed(v_pf, z_f, z_s);
            (rotate(i, Rotation::Two), rotate(v, Rotation::Two))
        }
        FaultType::Bcg => {
            let (i, v) = two_phase_ground_primed(v_pf, z_f, z_s);
            (rotate(i, Rotation::Identity), rotate(v, Rotation::Identity))
        }
        FaultType::Cag => {
            let (i, v) = two_phase_ground_primed(v_pf, z_f, z_s);
            (rotate(i, Rotation::One), rotate(v, Rotation::One))
        }
        FaultType::Abg => {
            let (i, v) = two_phase_ground_primed(v_pf, z_f, z_s);
            (rotate(i, Rotation::Two), rotate(v, Rotation::Two))
        }
        FaultType::Abc => balanced_three_phase(v_pf, z_f, z_s),
    };

    let mut state = PhasorState::flat(freq);
    state.set(ChannelKind::VA, to_phasor(voltages.a));
    state.set(ChannelKind::VB, to_phasor(voltages.b));
    state.set(ChannelKind::VC, to_phasor(voltages.c));
    state.set(ChannelKind::IA, to_phasor(currents.a));
    state.set(ChannelKind::IB, to_phasor(currents.b));
    state.set(ChannelKind::IC, to_phasor(currents.c));
    state
}
