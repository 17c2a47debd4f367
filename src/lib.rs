// Tue Jan 15 2026 - Alex

pub mod config;
pub mod error;
pub mod orchestration;
pub mod transport;
pub mod utils;

pub use config::Config;
pub use error::{MonitorError, MonitorResult};
pub use orchestration::{DiscoveryController, MonitorCoordinator, OutputFinalizer, RunReport, StatsAggregator};
pub use transport::BroadcastDiscovery;
