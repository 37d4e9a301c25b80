use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use axemode_core_types::{AxeModeError, CycleId, MarkerId, SubtreeRef, TargetSelector};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::to_writer_pretty;

pub mod activation;

pub use activation::{ActivationCenter, ActivationFlags};

/// What happened to the overlay, recorded for diagnostics only.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverlayEventKind {
    ActivationChanged {
        disabled: bool,
        interactive: bool,
        suspended: bool,
    },
    AuditScheduled {
        subtree: SubtreeRef,
        superseded: bool,
    },
    AuditCompleted {
        violations: usize,
        targets: usize,
    },
    AuditFailed {
        error: String,
    },
    AuditDiscarded {
        reason: String,
    },
    LookupFailed {
        selector: TargetSelector,
        reason: String,
    },
    MarkerInstalled {
        selector: TargetSelector,
        marker: MarkerId,
    },
    MarkerRemoved {
        selector: TargetSelector,
        marker: MarkerId,
    },
    DisclosureChanged {
        selector: TargetSelector,
        open: bool,
    },
}

impl OverlayEventKind {
    pub fn selector(&self) -> Option<&TargetSelector> {
        match self {
            OverlayEventKind::LookupFailed { selector, .. }
            | OverlayEventKind::MarkerInstalled { selector, .. }
            | OverlayEventKind::MarkerRemoved { selector, .. }
            | OverlayEventKind::DisclosureChanged { selector, .. } => Some(selector),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct OverlayEvent {
    pub cycle: CycleId,
    pub kind: OverlayEventKind,
    pub recorded_at: SystemTime,
}

impl OverlayEvent {
    pub fn new(cycle: CycleId, kind: OverlayEventKind) -> Self {
        Self {
            cycle,
            kind,
            recorded_at: SystemTime::now(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct StateCenterStats {
    pub total_events: u64,
    pub audits_scheduled: u64,
    pub audits_superseded: u64,
    pub audits_completed: u64,
    pub audits_failed: u64,
    pub audits_discarded: u64,
    pub lookup_failures: u64,
    pub markers_installed: u64,
    pub markers_removed: u64,
    pub disclosure_changes: u64,
    pub activation_changes: u64,
}

#[derive(Debug)]
struct BoundedRing<T> {
    capacity: usize,
    data: VecDeque<T>,
}

impl<T> BoundedRing<T> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            data: VecDeque::new(),
        }
    }
}

impl<T: Clone> BoundedRing<T> {
    fn push(&mut self, item: T) {
        if self.data.len() == self.capacity {
            self.data.pop_front();
        }
        self.data.push_back(item);
    }

    fn snapshot(&self) -> Vec<T> {
        self.data.iter().cloned().collect()
    }
}

#[async_trait]
pub trait StateCenter: Send + Sync {
    async fn append(&self, event: OverlayEvent) -> Result<(), AxeModeError>;
}

/// In-memory ring buffer keeping recent overlay events, globally and per target selector.
pub struct InMemoryStateCenter {
    selector_capacity: usize,
    events: Mutex<BoundedRing<OverlayEvent>>,
    selector_events: DashMap<TargetSelector, Mutex<BoundedRing<OverlayEvent>>>,
    stats: Mutex<StateCenterStats>,
}

impl InMemoryStateCenter {
    pub fn new(capacity: usize) -> Self {
        let global_capacity = capacity.max(1);
        let selector_capacity = std::cmp::max(global_capacity / 4, 16);
        Self {
            selector_capacity,
            events: Mutex::new(BoundedRing::new(global_capacity)),
            selector_events: DashMap::new(),
            stats: Mutex::new(StateCenterStats::default()),
        }
    }

    pub fn snapshot(&self) -> Vec<OverlayEvent> {
        self.events.lock().snapshot()
    }

    pub fn stats(&self) -> StateCenterStats {
        self.stats.lock().clone()
    }

    pub fn recent_selector(&self, selector: &TargetSelector) -> Vec<OverlayEvent> {
        self.selector_events
            .get(selector)
            .map(|entry| entry.value().lock().snapshot())
            .unwrap_or_default()
    }

    /// Lookup failures still held in the global ring.
    pub fn lookup_failures(&self) -> Vec<(TargetSelector, String)> {
        self.snapshot()
            .into_iter()
            .filter_map(|event| match event.kind {
                OverlayEventKind::LookupFailed { selector, reason } => Some((selector, reason)),
                _ => None,
            })
            .collect()
    }

    pub fn write_snapshot<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let snapshot = StateCenterSnapshot {
            stats: self.stats(),
            events: self
                .snapshot()
                .iter()
                .map(SerializableOverlayEvent::from)
                .collect(),
            selectors: self.selector_events.len(),
        };
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        to_writer_pretty(&mut writer, &snapshot)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
        writer.flush()?;
        Ok(())
    }

    fn push_scoped(&self, event: &OverlayEvent) {
        if let Some(selector) = event.kind.selector() {
            self.selector_events
                .entry(selector.clone())
                .or_insert_with(|| Mutex::new(BoundedRing::new(self.selector_capacity)))
                .lock()
                .push(event.clone());
        }
    }

    fn update_stats(&self, event: &OverlayEvent) {
        let mut stats = self.stats.lock();
        stats.total_events += 1;
        match &event.kind {
            OverlayEventKind::ActivationChanged { .. } => stats.activation_changes += 1,
            OverlayEventKind::AuditScheduled { superseded, .. } => {
                stats.audits_scheduled += 1;
                if *superseded {
                    stats.audits_superseded += 1;
                }
            }
            OverlayEventKind::AuditCompleted { .. } => stats.audits_completed += 1,
            OverlayEventKind::AuditFailed { .. } => stats.audits_failed += 1,
            OverlayEventKind::AuditDiscarded { .. } => stats.audits_discarded += 1,
            OverlayEventKind::LookupFailed { .. } => stats.lookup_failures += 1,
            OverlayEventKind::MarkerInstalled { .. } => stats.markers_installed += 1,
            OverlayEventKind::MarkerRemoved { .. } => stats.markers_removed += 1,
            OverlayEventKind::DisclosureChanged { .. } => stats.disclosure_changes += 1,
        }
    }
}

#[async_trait]
impl StateCenter for InMemoryStateCenter {
    async fn append(&self, event: OverlayEvent) -> Result<(), AxeModeError> {
        self.push_scoped(&event);
        self.update_stats(&event);
        self.events.lock().push(event);
        Ok(())
    }
}

/// No-op state center for callers that do not keep diagnostics.
pub struct NoopStateCenter;

impl NoopStateCenter {
    pub fn new() -> Arc<dyn StateCenter> {
        Arc::new(Self)
    }
}

#[async_trait]
impl StateCenter for NoopStateCenter {
    async fn append(&self, _event: OverlayEvent) -> Result<(), AxeModeError> {
        Ok(())
    }
}

#[derive(Serialize)]
struct StateCenterSnapshot {
    stats: StateCenterStats,
    events: Vec<SerializableOverlayEvent>,
    selectors: usize,
}

#[derive(Serialize)]
struct SerializableOverlayEvent {
    cycle: u64,
    #[serde(flatten)]
    kind: OverlayEventKind,
    recorded_at_ms: u128,
}

impl From<&OverlayEvent> for SerializableOverlayEvent {
    fn from(event: &OverlayEvent) -> Self {
        Self {
            cycle: event.cycle.0,
            kind: event.kind.clone(),
            recorded_at_ms: system_time_to_millis(event.recorded_at),
        }
    }
}

fn system_time_to_millis(time: SystemTime) -> u128 {
    time.duration_since(UNIX_EPOCH)
        .map(|dur| dur.as_millis())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn lookup_failed(selector: &str) -> OverlayEvent {
        OverlayEvent::new(
            CycleId(1),
            OverlayEventKind::LookupFailed {
                selector: TargetSelector::from(selector),
                reason: "no element".into(),
            },
        )
    }

    #[tokio::test]
    async fn in_memory_center_bounded() {
        let center = InMemoryStateCenter::new(2);
        center
            .append(OverlayEvent::new(
                CycleId(0),
                OverlayEventKind::AuditScheduled {
                    subtree: SubtreeRef::from("root"),
                    superseded: false,
                },
            ))
            .await
            .unwrap();
        center.append(lookup_failed("#gone")).await.unwrap();
        center
            .append(OverlayEvent::new(
                CycleId(1),
                OverlayEventKind::MarkerInstalled {
                    selector: TargetSelector::from("#hey"),
                    marker: MarkerId::new(),
                },
            ))
            .await
            .unwrap();

        let events = center.snapshot();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0].kind,
            OverlayEventKind::LookupFailed { .. }
        ));

        let stats = center.stats();
        assert_eq!(stats.total_events, 3);
        assert_eq!(stats.audits_scheduled, 1);
        assert_eq!(stats.lookup_failures, 1);
        assert_eq!(stats.markers_installed, 1);

        assert_eq!(center.recent_selector(&TargetSelector::from("#hey")).len(), 1);
        assert_eq!(center.lookup_failures().len(), 1);
    }

    #[tokio::test]
    async fn snapshot_written_as_json() {
        let center = InMemoryStateCenter::new(8);
        center.append(lookup_failed("#gone")).await.unwrap();

        let file = NamedTempFile::new().expect("tempfile");
        center
            .write_snapshot(file.path())
            .expect("write snapshot to disk");
        let written = std::fs::read_to_string(file.path()).expect("read snapshot");
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(value["stats"]["lookup_failures"], 1);
        assert_eq!(value["events"][0]["kind"], "lookup_failed");
        assert_eq!(value["events"][0]["selector"], "#gone");
    }
}
