//! End-to-end acceptance scenarios driving whole publisher/tester
//! stacks together, one module per scenario.

mod common;
mod s1_publish_frames;
mod s2_ramp_pickup;
mod s3_solid_ag_fault;
mod s4_idmt_definite_time;
mod s5_trip_rule_and;
mod s6_sequence_goose_trip;
