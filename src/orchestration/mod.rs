// Tue Jan 13 2026 - Alex

pub mod coordinator;
pub mod discovery;
pub mod session;
pub mod aggregator;
pub mod finalizer;

pub use coordinator::MonitorCoordinator;
pub use discovery::{candidate_names, DiscoveryController, ScopedConnection};
pub use session::{SessionContext, SessionPhase};
pub use aggregator::{AggregateState, SessionOutcome, StatsAggregator, StatsPolicy, StatsReport, UnhandledPolicy};
pub use finalizer::{EndReason, OutputFinalizer, RunReport};
