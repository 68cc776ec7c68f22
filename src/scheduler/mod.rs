pub mod poller;
pub mod shutdown;
pub mod state;

pub use poller::{PollingScheduler, PollingSettings};
pub use shutdown::{Shutdown, ShutdownSignal};
pub use state::{DegradedReason, MetricsView, SchedulerState, TickReport};
