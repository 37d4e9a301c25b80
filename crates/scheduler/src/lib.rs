pub mod error;
pub mod executor;
pub mod metrics;
pub mod model;
pub mod runtime;

pub use error::SchedulerError;
pub use executor::{IdleExecutor, ManualIdleExecutor, TokioIdleExecutor};
pub use model::{IdleHandle, IdleJob, ScheduleOutcome, SchedulerConfig};
pub use runtime::AuditScheduler;
