//! S3 — a solid (zero-impedance) phase-A-to-ground fault: the faulted
//! phase collapses in voltage and carries the whole fault current,
//! while the two healthy phases stay near zero.

use num_complex::Complex64;
use svts_scenario::impedance::{compute, FaultType, SourceImpedance};
use svts_signal::ChannelKind;

#[test]
fn s3_solid_ag_fault() {
    let source = SourceImpedance {
        z1: Complex64::new(1.0, 10.0),
        z0: Complex64::new(3.0, 30.0),
    };
    let state = compute(FaultType::Ag, Complex64::new(0.0, 0.0), source, 66_395.0, 60.0);

    let ia = state.get(ChannelKind::IA).magnitude;
    let ib = state.get(ChannelKind::IB).magnitude;
    let ic = state.get(ChannelKind::IC).magnitude;
    let va = state.get(ChannelKind::VA).magnitude;

    assert!(ia > 1000.0, "|I_a| = {ia} should exceed 1000 A");
    assert!(va < 1000.0, "|V_a| = {va} should collapse below 1000 V");
    assert!(ib < ia, "|I_b| = {ib} should be less than |I_a| = {ia}");
    assert!(ic < ia, "|I_c| = {ic} should be less than |I_a| = {ia}");
}
