//! Fault-scenario engines (components J, K, L): the sequence engine,
//! the symmetrical-components impedance calculator, and the
//! closed-loop testers that drive faults into the publisher manager
//! and correlate trip decisions against them.

pub mod impedance;
pub mod sequence;
pub mod testers;

pub use impedance::{compute as compute_fault_phasors, FaultType, SourceImpedance};
pub use sequence::{ProgressCallback, Sequence, SequenceEngine, SequenceState, TransitionType, TICK_PERIOD};
pub use testers::{
    Curve, DifferentialConfig, DifferentialPoint, DifferentialTester, DistanceConfig, DistancePoint, DistanceTester,
    OvercurrentConfig, OvercurrentPoint, OvercurrentTester, PointResult, RampVariable, RampingConfig, RampingResult,
    RampingTester, TesterContext, Tolerance,
};
