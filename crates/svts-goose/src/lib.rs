//! GOOSE subscriber, data-object map, and trip-rule evaluator
//! (components E and F). Decode-only: this crate never publishes GOOSE.

pub mod datamap;
pub mod decode;
pub mod rule;
pub mod subscriber;

pub use datamap::{GooseDataMap, GooseDataPoint, GooseValue};
pub use decode::{decode_frame, GoosePdu};
pub use rule::{CmpOp, Expr, Literal, RuleSet};
pub use subscriber::{GooseSubscriber, SinkFactory, SubscriberRuntime, SubscriberStatus};
