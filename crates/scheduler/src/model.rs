use std::time::Duration;

use futures::future::BoxFuture;

/// Deferred unit of work handed to an idle executor.
pub type IdleJob = BoxFuture<'static, ()>;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct IdleHandle(pub u64);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScheduleOutcome {
    /// Queued for idle execution; `superseded` is true when a not-yet-run job was cancelled.
    Deferred { handle: IdleHandle, superseded: bool },
    /// No idle primitive; the job already ran to completion.
    RanInline,
}

impl ScheduleOutcome {
    pub fn superseded(&self) -> bool {
        matches!(self, ScheduleOutcome::Deferred { superseded: true, .. })
    }
}

#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    pub idle_delay: Duration,
    pub force_sync: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            idle_delay: Duration::from_millis(50),
            force_sync: false,
        }
    }
}
