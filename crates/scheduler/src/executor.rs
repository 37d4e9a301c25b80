use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::SchedulerError;
use crate::model::{IdleHandle, IdleJob};

/// Low-priority execution primitive offered by the host.
pub trait IdleExecutor: Send + Sync {
    fn request_idle(&self, job: IdleJob) -> IdleHandle;

    /// Cancels a job that has not started yet. Returns false when the job already
    /// started (or finished), in which case it is left to run.
    fn cancel_idle(&self, handle: IdleHandle) -> bool;
}

/// Runs jobs on the tokio runtime after yielding and waiting out an idle delay.
pub struct TokioIdleExecutor {
    runtime: Handle,
    delay: Duration,
    next_id: AtomicU64,
    waiting: Arc<DashMap<u64, CancellationToken>>,
}

impl TokioIdleExecutor {
    pub fn new(delay: Duration) -> Result<Self, SchedulerError> {
        let runtime = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;
        Ok(Self {
            runtime,
            delay,
            next_id: AtomicU64::new(1),
            waiting: Arc::new(DashMap::new()),
        })
    }

    pub fn waiting(&self) -> usize {
        self.waiting.len()
    }
}

impl IdleExecutor for TokioIdleExecutor {
    fn request_idle(&self, job: IdleJob) -> IdleHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        self.waiting.insert(id, token.clone());

        let waiting = Arc::clone(&self.waiting);
        let delay = self.delay;
        self.runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    trace!(target: "axemode.scheduler", id, "idle.job.cancelled");
                    return;
                }
                _ = async {
                    tokio::task::yield_now().await;
                    tokio::time::sleep(delay).await;
                } => {}
            }
            // Whoever removes the entry first wins: either this task starts or cancel_idle succeeds.
            if waiting.remove(&id).is_none() {
                return;
            }
            trace!(target: "axemode.scheduler", id, "idle.job.started");
            job.await;
        });
        IdleHandle(id)
    }

    fn cancel_idle(&self, handle: IdleHandle) -> bool {
        match self.waiting.remove(&handle.0) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// Idle queue pumped by the host's own event loop via [`ManualIdleExecutor::run_pending`].
#[derive(Default)]
pub struct ManualIdleExecutor {
    next_id: AtomicU64,
    queue: Mutex<VecDeque<(IdleHandle, IdleJob)>>,
}

impl ManualIdleExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Runs every job queued at call time, in order. Returns how many ran.
    pub async fn run_pending(&self) -> usize {
        let mut ran = 0;
        let budget = self.pending();
        while ran < budget {
            let next = self.queue.lock().pop_front();
            match next {
                Some((handle, job)) => {
                    trace!(target: "axemode.scheduler", id = handle.0, "idle.job.started");
                    job.await;
                    ran += 1;
                }
                None => break,
            }
        }
        ran
    }
}

impl IdleExecutor for ManualIdleExecutor {
    fn request_idle(&self, job: IdleJob) -> IdleHandle {
        let handle = IdleHandle(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.queue.lock().push_back((handle, job));
        handle
    }

    fn cancel_idle(&self, handle: IdleHandle) -> bool {
        let mut queue = self.queue.lock();
        match queue.iter().position(|(queued, _)| *queued == handle) {
            Some(index) => {
                queue.remove(index);
                true
            }
            None => false,
        }
    }
}
