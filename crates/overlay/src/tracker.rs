use std::sync::Arc;

use axemode_core_types::{MarkerId, Rect, TargetSelector};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::geometry::GeometrySource;
use crate::ports::{MarkerRole, OverlaySurface};

/// Keeps one marker glued to one element's bounding rectangle.
///
/// The marker is created and positioned synchronously in [`PositionTracker::start`], then
/// moved on every geometry change until [`PositionTracker::stop`]. The marker is removed
/// only after the observation task has finished, so no late update can move a removed
/// marker.
pub struct PositionTracker {
    selector: TargetSelector,
    marker: MarkerId,
    surface: Arc<dyn OverlaySurface>,
    last_rect: Arc<Mutex<Rect>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PositionTracker {
    /// Must be called from within a tokio runtime.
    pub fn start(
        selector: TargetSelector,
        source: Arc<dyn GeometrySource>,
        surface: Arc<dyn OverlaySurface>,
        role: MarkerRole,
    ) -> Self {
        let marker = surface.create_marker(&selector, role);
        // Read the starting rect from the receiver it marks as seen, so a publish racing
        // this call is either picked up here or delivered as a change.
        let mut rx = source.watch();
        let initial = *rx.borrow_and_update();
        surface.position_marker(&marker, initial);
        let last_rect = Arc::new(Mutex::new(initial));
        debug!(target: "axemode.overlay", %selector, marker = %marker.0, rect = %initial, "tracker.started");

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task_surface = Arc::clone(&surface);
        let task_marker = marker.clone();
        let task_rect = Arc::clone(&last_rect);
        let task = tokio::spawn(async move {
            // Holding the source keeps polling feeds alive for the tracker's lifetime.
            let _source = source;
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let rect = *rx.borrow_and_update();
                        *task_rect.lock() = rect;
                        task_surface.position_marker(&task_marker, rect);
                        trace!(target: "axemode.overlay", %rect, "tracker.moved");
                    }
                }
            }
        });

        Self {
            selector,
            marker,
            surface,
            last_rect,
            cancel,
            task: Some(task),
        }
    }

    pub fn selector(&self) -> &TargetSelector {
        &self.selector
    }

    pub fn marker(&self) -> &MarkerId {
        &self.marker
    }

    /// Last rectangle propagated to the marker.
    pub fn rect(&self) -> Rect {
        *self.last_rect.lock()
    }

    pub fn is_active(&self) -> bool {
        self.task
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    /// Ends observation, then removes the marker.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        self.surface.remove_marker(&self.marker);
        debug!(target: "axemode.overlay", selector = %self.selector, "tracker.stopped");
    }
}

impl Drop for PositionTracker {
    fn drop(&mut self) {
        // Dropped without stop(): end observation; the marker is left to the surface owner.
        self.cancel.cancel();
    }
}
