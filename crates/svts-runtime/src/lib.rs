//! Worker pool, SV publisher instance, and publisher manager
//! (components G, H, I): the execution layer that turns a `StreamConfig`
//! and a `PhasorState` into a steady stream of Ethernet frames.

pub mod manager;
pub mod pool;
pub mod publisher;
pub mod realtime;

pub use manager::PublisherManager;
pub use pool::{TaskHandle, WorkerPool};
pub use publisher::{PublisherRuntime, PublisherStatus, SinkFactory, SvPublisher};
