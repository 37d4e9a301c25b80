use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::SchedulerError;
use crate::executor::{IdleExecutor, TokioIdleExecutor};
use crate::metrics;
use crate::model::{IdleHandle, ScheduleOutcome, SchedulerConfig};

#[derive(Clone, Copy, Debug)]
struct PendingSlot {
    ticket: u64,
    handle: IdleHandle,
}

/// Debounced single-slot scheduler: at most one job waits for idle time, and a new
/// request cancels a waiting one (last request wins). Without an idle executor the
/// job runs inline.
pub struct AuditScheduler {
    executor: Option<Arc<dyn IdleExecutor>>,
    slot: Arc<Mutex<Option<PendingSlot>>>,
    tickets: AtomicU64,
    torn_down: AtomicBool,
}

impl AuditScheduler {
    pub fn new(executor: Option<Arc<dyn IdleExecutor>>) -> Self {
        Self {
            executor,
            slot: Arc::new(Mutex::new(None)),
            tickets: AtomicU64::new(0),
            torn_down: AtomicBool::new(false),
        }
    }

    /// Uses the tokio idle executor when a runtime is present, the inline fallback otherwise.
    pub fn from_config(config: &SchedulerConfig) -> Self {
        if config.force_sync {
            return Self::new(None);
        }
        match TokioIdleExecutor::new(config.idle_delay) {
            Ok(executor) => Self::new(Some(Arc::new(executor))),
            Err(err) => {
                warn!(target: "axemode.scheduler", %err, "idle scheduling unavailable; running audits inline");
                Self::new(None)
            }
        }
    }

    pub fn is_deferred(&self) -> bool {
        self.executor.is_some()
    }

    pub fn has_pending(&self) -> bool {
        self.slot.lock().is_some()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    pub async fn schedule<F>(&self, job: F) -> Result<ScheduleOutcome, SchedulerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_torn_down() {
            return Err(SchedulerError::TornDown);
        }
        metrics::record_scheduled();

        let executor = match &self.executor {
            Some(executor) => Arc::clone(executor),
            None => {
                metrics::record_inline();
                debug!(target: "axemode.scheduler", "audit.run.inline");
                job.await;
                metrics::record_executed();
                return Ok(ScheduleOutcome::RanInline);
            }
        };

        let ticket = self.tickets.fetch_add(1, Ordering::Relaxed) + 1;
        let slot = Arc::clone(&self.slot);
        let wrapped = async move {
            {
                let mut guard = slot.lock();
                let current = *guard;
                if current.map(|pending| pending.ticket) == Some(ticket) {
                    *guard = None;
                }
            }
            job.await;
            metrics::record_executed();
        }
        .boxed();

        // The slot lock is held across the request so the job cannot observe the slot
        // before it records its own ticket.
        let mut guard = self.slot.lock();
        let superseded = match guard.take() {
            Some(previous) => {
                let cancelled = executor.cancel_idle(previous.handle);
                if cancelled {
                    metrics::record_superseded();
                }
                cancelled
            }
            None => false,
        };
        let handle = executor.request_idle(wrapped);
        *guard = Some(PendingSlot { ticket, handle });
        drop(guard);

        debug!(target: "axemode.scheduler", ticket, superseded, "audit.scheduled");
        Ok(ScheduleOutcome::Deferred { handle, superseded })
    }

    /// Cancels the waiting job, if any. Returns true when one was cancelled.
    pub fn cancel(&self) -> bool {
        let previous = self.slot.lock().take();
        match (previous, &self.executor) {
            (Some(previous), Some(executor)) => {
                let cancelled = executor.cancel_idle(previous.handle);
                if cancelled {
                    metrics::record_cancelled();
                    debug!(target: "axemode.scheduler", ticket = previous.ticket, "audit.cancelled");
                }
                cancelled
            }
            _ => false,
        }
    }

    /// Cancels the waiting job and refuses any further scheduling.
    pub fn teardown(&self) -> bool {
        self.torn_down.store(true, Ordering::SeqCst);
        self.cancel()
    }
}

impl Drop for AuditScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
