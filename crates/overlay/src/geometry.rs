//! Geometry feeds for tracked elements.

use std::time::Duration;

use axemode_core_types::Rect;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// A live element's bounding rectangle and a feed of its changes.
pub trait GeometrySource: Send + Sync {
    fn current_rect(&self) -> Rect;

    /// Receiver that is notified whenever the rectangle changes.
    fn watch(&self) -> watch::Receiver<Rect>;
}

/// Geometry pushed by a host that observes layout natively.
pub struct ObservedGeometry {
    tx: watch::Sender<Rect>,
}

impl ObservedGeometry {
    pub fn new(initial: Rect) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Publishes a new rectangle; returns false when it equals the current one.
    pub fn publish(&self, rect: Rect) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == rect {
                false
            } else {
                *current = rect;
                true
            }
        })
    }
}

impl GeometrySource for ObservedGeometry {
    fn current_rect(&self) -> Rect {
        *self.tx.borrow()
    }

    fn watch(&self) -> watch::Receiver<Rect> {
        self.tx.subscribe()
    }
}

/// Geometry sampled once per frame from a probe closure.
///
/// The probe returns `None` while the element is momentarily unmeasurable; the last known
/// rectangle is kept in that case. Polling stops when the source is dropped.
pub struct PollingGeometry {
    tx: watch::Sender<Rect>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollingGeometry {
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(initial: Rect, interval: Duration, probe: F) -> Self
    where
        F: Fn() -> Option<Rect> + Send + Sync + 'static,
    {
        let (tx, _rx) = watch::channel(initial);
        let cancel = CancellationToken::new();
        let feed = tx.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(rect) = probe() else { continue };
                        let changed = feed.send_if_modified(|current| {
                            if *current == rect {
                                false
                            } else {
                                *current = rect;
                                true
                            }
                        });
                        if changed {
                            trace!(target: "axemode.overlay", %rect, "geometry.sampled");
                        }
                    }
                }
            }
        });
        Self { tx, cancel, task }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl GeometrySource for PollingGeometry {
    fn current_rect(&self) -> Rect {
        *self.tx.borrow()
    }

    fn watch(&self) -> watch::Receiver<Rect> {
        self.tx.subscribe()
    }
}

impl Drop for PollingGeometry {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
