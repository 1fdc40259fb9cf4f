pub mod api;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod prober;
pub mod retry;
pub mod scheduler;
pub mod server;
pub mod simulator;
pub mod stats;
pub mod store;
pub mod telemetry;
pub mod types;

pub use dispatcher::{Deliver, DeliveryError, PingDispatcher};
pub use prober::LatencyProber;
pub use retry::{BackoffStrategy, RetryPolicy};
pub use scheduler::RetryScheduler;
pub use server::CollectorServer;
pub use stats::{ClientStatistics, ResponseTimeSummary, StatisticsSnapshot};
pub use store::CollectedStore;
pub use types::*;
