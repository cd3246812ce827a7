//! Shared types, configuration, error model, and process-wide primitives
//! used across the virtual SVTS workspace.

pub mod config;
pub mod error;
pub mod metrics;
pub mod state;
pub mod time;
pub mod trip_flag;

pub use config::{CpuAffinity, DaemonConfig, DataSource, MacAddress, SmpMod, StreamConfig, WorkerPoolConfig};
pub use error::{SvtsError, SvtsResult};
pub use metrics::CycleMetrics;
pub use state::{EngineState, StateMachine};
pub use time::{smp_cnt, TickIndex};
pub use trip_flag::{TripEdge, TripGetter, TripSignal};
