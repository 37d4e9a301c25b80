use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axemode_audit_oracle::{AuditOptions, AuditOracle, OracleError, StaticOracle};
use axemode_core_types::{AffectedNode, Check, Impact, MarkerId, Rect, SubtreeRef, TargetSelector, Violation};
use axemode_overlay::{
    AxeMode, DisclosureEvent, DisclosureState, ElementLookup, GeometrySource, HitRegion, KeyPress,
    LookupError, MarkerRole, ObservedGeometry, OverlayConfig, OverlayDeps, OverlayError,
    OverlaySurface, PanelView, PointerButton,
};
use axemode_scheduler::{AuditScheduler, IdleExecutor, ManualIdleExecutor};
use axemode_state_center::{ActivationCenter, ActivationFlags, InMemoryStateCenter};
use parking_lot::Mutex;
use tokio::sync::Notify;

#[derive(Default)]
struct FakeHost {
    elements: Mutex<HashMap<String, Arc<ObservedGeometry>>>,
    markers: Mutex<HashMap<MarkerId, (TargetSelector, MarkerRole, Rect)>>,
    panels: Mutex<HashMap<MarkerId, PanelView>>,
}

impl FakeHost {
    fn with_elements(elements: &[(&str, Rect)]) -> Arc<Self> {
        let host = Self::default();
        for (selector, rect) in elements {
            host.elements
                .lock()
                .insert(selector.to_string(), Arc::new(ObservedGeometry::new(*rect)));
        }
        Arc::new(host)
    }

    fn move_element(&self, selector: &str, rect: Rect) {
        if let Some(geometry) = self.elements.lock().get(selector) {
            geometry.publish(rect);
        }
    }

    fn marker_count(&self) -> usize {
        self.markers.lock().len()
    }

    fn marker_for(&self, selector: &str) -> Option<(MarkerId, MarkerRole, Rect)> {
        self.markers
            .lock()
            .iter()
            .find(|(_, (target, _, _))| target.as_str() == selector)
            .map(|(id, (_, role, rect))| (id.clone(), *role, *rect))
    }

    fn panel_titles(&self) -> Vec<String> {
        self.panels.lock().values().map(|p| p.title.clone()).collect()
    }
}

impl ElementLookup for FakeHost {
    fn resolve(
        &self,
        _root: &SubtreeRef,
        selector: &TargetSelector,
    ) -> Result<Arc<dyn GeometrySource>, LookupError> {
        self.elements
            .lock()
            .get(selector.as_str())
            .cloned()
            .map(|geometry| geometry as Arc<dyn GeometrySource>)
            .ok_or_else(|| LookupError::NotFound(selector.clone()))
    }
}

impl OverlaySurface for FakeHost {
    fn create_marker(&self, selector: &TargetSelector, role: MarkerRole) -> MarkerId {
        let id = MarkerId::new();
        self.markers
            .lock()
            .insert(id.clone(), (selector.clone(), role, Rect::default()));
        id
    }

    fn position_marker(&self, marker: &MarkerId, rect: Rect) {
        if let Some(entry) = self.markers.lock().get_mut(marker) {
            entry.2 = rect;
        }
    }

    fn remove_marker(&self, marker: &MarkerId) {
        self.markers.lock().remove(marker);
    }

    fn show_panel(&self, marker: &MarkerId, panel: &PanelView, _anchor: Rect) {
        self.panels.lock().insert(marker.clone(), panel.clone());
    }

    fn hide_panel(&self, marker: &MarkerId) {
        self.panels.lock().remove(marker);
    }
}

/// Oracle that blocks until released, to hold an audit in flight.
struct GatedOracle {
    gate: Notify,
    violations: Vec<Violation>,
}

#[async_trait]
impl AuditOracle for GatedOracle {
    async fn run_audit(
        &self,
        _root: &SubtreeRef,
        _options: &AuditOptions,
    ) -> Result<Vec<Violation>, OracleError> {
        self.gate.notified().await;
        Ok(self.violations.clone())
    }
}

fn sample_violations() -> Vec<Violation> {
    vec![
        Violation {
            id: "A".into(),
            impact: Some(Impact::Critical),
            help: "help A".into(),
            help_url: "https://example.test/A".into(),
            nodes: vec![AffectedNode {
                target: vec!["#hey".into()],
                any: vec![],
                all: vec![Check::new("c1", "msg1")],
            }],
        },
        Violation {
            id: "B".into(),
            impact: Some(Impact::Minor),
            help: "help B".into(),
            help_url: String::new(),
            nodes: vec![
                AffectedNode {
                    target: vec!["#hey".into()],
                    ..AffectedNode::default()
                },
                AffectedNode {
                    target: vec!["#yo".into()],
                    ..AffectedNode::default()
                },
            ],
        },
    ]
}

fn sample_host() -> Arc<FakeHost> {
    FakeHost::with_elements(&[
        ("#hey", Rect::new(10.0, 10.0, 100.0, 20.0)),
        ("#yo", Rect::new(10.0, 50.0, 100.0, 20.0)),
    ])
}

struct Harness {
    overlay: Arc<AxeMode>,
    host: Arc<FakeHost>,
    executor: Arc<ManualIdleExecutor>,
    diagnostics: Arc<InMemoryStateCenter>,
}

fn harness(oracle: Arc<dyn AuditOracle>, host: Arc<FakeHost>, config: OverlayConfig) -> Harness {
    let executor = Arc::new(ManualIdleExecutor::new());
    let diagnostics = Arc::new(InMemoryStateCenter::new(256));
    let deps = OverlayDeps {
        oracle,
        lookup: host.clone(),
        surface: host.clone(),
        names: None,
        state_center: diagnostics.clone(),
    };
    let activation = Arc::new(ActivationCenter::new(config.initial_flags));
    let scheduler = AuditScheduler::new(Some(executor.clone() as Arc<dyn IdleExecutor>));
    let overlay = AxeMode::with_parts(config, deps, activation, scheduler);
    Harness {
        overlay,
        host,
        executor,
        diagnostics,
    }
}

fn toggle_press() -> KeyPress {
    "ctrl+.".parse().unwrap()
}

#[tokio::test]
async fn audit_places_one_marker_per_target() {
    let oracle = Arc::new(StaticOracle::new(sample_violations()));
    let h = harness(oracle.clone(), sample_host(), OverlayConfig::default());

    assert!(h.overlay.mount(SubtreeRef::from("app")).await.unwrap());
    assert_eq!(h.host.marker_count(), 0);
    assert_eq!(h.executor.run_pending().await, 1);

    let snapshot = h.overlay.snapshot().await;
    let selectors: Vec<&str> = snapshot.entries.iter().map(|e| e.selector.as_str()).collect();
    assert_eq!(selectors, vec!["#hey", "#yo"]);
    assert_eq!(snapshot.entries[0].violations, vec!["A", "B"]);
    assert_eq!(snapshot.entries[1].violations, vec!["B"]);
    assert_eq!(snapshot.cycle.0, 1);

    let (_, role, rect) = h.host.marker_for("#hey").unwrap();
    assert_eq!(role, MarkerRole::Decorative);
    assert_eq!(rect, Rect::new(10.0, 10.0, 100.0, 20.0));
    assert_eq!(h.host.marker_count(), 2);
    assert_eq!(oracle.calls(), 1);
}

#[tokio::test]
async fn rapid_changes_collapse_into_one_audit() {
    let oracle = Arc::new(StaticOracle::new(sample_violations()));
    let h = harness(oracle.clone(), sample_host(), OverlayConfig::default());

    h.overlay.mount(SubtreeRef::from("v1")).await.unwrap();
    h.overlay.subtree_changed(SubtreeRef::from("v2")).await.unwrap();
    h.overlay.subtree_changed(SubtreeRef::from("v3")).await.unwrap();
    assert_eq!(h.executor.pending(), 1);

    h.executor.run_pending().await;
    assert_eq!(oracle.audited(), vec![SubtreeRef::from("v3")]);
    assert_eq!(h.diagnostics.stats().audits_superseded, 2);
}

#[tokio::test]
async fn markers_follow_geometry() {
    let h = harness(
        Arc::new(StaticOracle::new(sample_violations())),
        sample_host(),
        OverlayConfig::default(),
    );
    h.overlay.mount(SubtreeRef::from("app")).await.unwrap();
    h.executor.run_pending().await;

    let moved = Rect::new(300.0, 10.0, 100.0, 20.0);
    h.host.move_element("#hey", moved);
    tokio::time::sleep(Duration::from_millis(5)).await;

    assert_eq!(h.host.marker_for("#hey").unwrap().2, moved);
    let snapshot = h.overlay.snapshot().await;
    assert_eq!(snapshot.entries[0].rect, moved);
}

#[tokio::test]
async fn unresolvable_target_is_skipped() {
    let mut violations = sample_violations();
    violations[0].nodes[0].target.push("#gone".into());
    let h = harness(
        Arc::new(StaticOracle::new(violations)),
        sample_host(),
        OverlayConfig::default(),
    );
    h.overlay.mount(SubtreeRef::from("app")).await.unwrap();
    h.executor.run_pending().await;

    assert_eq!(h.host.marker_count(), 2);
    let failures = h.diagnostics.lookup_failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0.as_str(), "#gone");
    assert_eq!(h.overlay.snapshot().await.targets.len(), 3);
}

#[tokio::test]
async fn passive_hover_opens_panel() {
    let h = harness(
        Arc::new(StaticOracle::new(sample_violations())),
        sample_host(),
        OverlayConfig::default(),
    );
    h.overlay.mount(SubtreeRef::from("app")).await.unwrap();
    h.executor.run_pending().await;
    let hey = TargetSelector::from("#hey");

    let opened = h.overlay.dispatch(&hey, DisclosureEvent::PointerEnter).await.unwrap();
    assert_eq!(opened, Some(DisclosureState::Open));
    assert_eq!(h.host.panel_titles(), vec!["#hey".to_string()]);

    let pressed = h
        .overlay
        .dispatch(&hey, DisclosureEvent::press(HitRegion::Marker))
        .await
        .unwrap();
    assert_eq!(pressed, None);

    let closed = h.overlay.dispatch(&hey, DisclosureEvent::PointerLeave).await.unwrap();
    assert_eq!(closed, Some(DisclosureState::Closed));
    assert!(h.host.panel_titles().is_empty());

    assert!(matches!(
        h.overlay
            .dispatch(&TargetSelector::from("#nope"), DisclosureEvent::PointerEnter)
            .await,
        Err(OverlayError::UnknownTarget(_))
    ));
}

#[tokio::test]
async fn shortcut_suspends_and_resumes_with_fresh_cycle() {
    let oracle = Arc::new(StaticOracle::new(sample_violations()));
    let h = harness(oracle.clone(), sample_host(), OverlayConfig::default());
    h.overlay.mount(SubtreeRef::from("app")).await.unwrap();
    h.executor.run_pending().await;
    let first = h.overlay.snapshot().await;
    assert_eq!(first.targets.len(), 2);
    h.overlay
        .dispatch(&TargetSelector::from("#hey"), DisclosureEvent::PointerEnter)
        .await
        .unwrap();

    assert_eq!(h.overlay.handle_key(&toggle_press()).await.unwrap(), Some(true));
    let snapshot = h.overlay.snapshot().await;
    assert!(snapshot.suspended);
    assert!(snapshot.entries.is_empty());
    assert_eq!(h.host.marker_count(), 0);
    assert!(h.host.panel_titles().is_empty());

    // Changes while suspended do not schedule audits.
    assert!(!h.overlay.subtree_changed(SubtreeRef::from("app")).await.unwrap());
    assert_eq!(h.executor.pending(), 0);

    assert_eq!(h.overlay.handle_key(&toggle_press()).await.unwrap(), Some(false));
    assert_eq!(h.executor.pending(), 1);
    h.executor.run_pending().await;
    let snapshot = h.overlay.snapshot().await;
    assert!(!snapshot.suspended);
    assert_eq!(snapshot.cycle.0, 2);
    assert_eq!(h.host.marker_count(), 2);
    assert_eq!(oracle.calls(), 2);
    assert_eq!(snapshot.targets, first.targets);
    assert!(snapshot
        .entries
        .iter()
        .all(|entry| entry.state == DisclosureState::Closed));
}

#[tokio::test]
async fn disabled_from_start_never_audits() {
    let oracle = Arc::new(StaticOracle::new(sample_violations()));
    let config = OverlayConfig {
        initial_flags: ActivationFlags::new(true, false),
        ..OverlayConfig::default()
    };
    let h = harness(oracle.clone(), sample_host(), config);

    assert!(!h.overlay.mount(SubtreeRef::from("app")).await.unwrap());
    assert_eq!(h.executor.pending(), 0);
    assert!(!h.overlay.subtree_changed(SubtreeRef::from("app")).await.unwrap());
    assert_eq!(h.executor.run_pending().await, 0);

    assert_eq!(oracle.calls(), 0);
    assert_eq!(h.host.marker_count(), 0);
    let snapshot = h.overlay.snapshot().await;
    assert!(snapshot.disabled);
    assert!(snapshot.targets.is_empty());
}

#[tokio::test]
async fn suspension_cancels_pending_audit() {
    let oracle = Arc::new(StaticOracle::new(sample_violations()));
    let h = harness(oracle.clone(), sample_host(), OverlayConfig::default());
    h.overlay.mount(SubtreeRef::from("app")).await.unwrap();

    h.overlay.set_disabled(true).await.unwrap();
    assert_eq!(h.executor.run_pending().await, 0);
    assert_eq!(oracle.calls(), 0);
    assert_eq!(h.host.marker_count(), 0);
}

#[tokio::test]
async fn in_flight_result_is_discarded_after_suspension() {
    let oracle = Arc::new(GatedOracle {
        gate: Notify::new(),
        violations: sample_violations(),
    });
    let h = harness(oracle.clone(), sample_host(), OverlayConfig::default());
    h.overlay.mount(SubtreeRef::from("app")).await.unwrap();

    let executor = Arc::clone(&h.executor);
    let running = tokio::spawn(async move { executor.run_pending().await });
    tokio::time::sleep(Duration::from_millis(5)).await;

    h.overlay.set_disabled(true).await.unwrap();
    oracle.gate.notify_one();
    assert_eq!(running.await.unwrap(), 1);

    assert_eq!(h.host.marker_count(), 0);
    assert!(h.overlay.snapshot().await.entries.is_empty());
    assert_eq!(h.diagnostics.stats().audits_discarded, 1);
}

#[tokio::test]
async fn failed_audit_keeps_previous_markers() {
    let oracle = Arc::new(StaticOracle::scripted(vec![
        Ok(sample_violations()),
        Err(OracleError::engine("engine crashed")),
    ]));
    let h = harness(oracle, sample_host(), OverlayConfig::default());
    h.overlay.mount(SubtreeRef::from("app")).await.unwrap();
    h.executor.run_pending().await;

    h.overlay.subtree_changed(SubtreeRef::from("app")).await.unwrap();
    h.executor.run_pending().await;

    let snapshot = h.overlay.snapshot().await;
    assert_eq!(snapshot.entries.len(), 2);
    assert_eq!(snapshot.cycle.0, 1);
    assert!(snapshot.last_error.unwrap().contains("engine crashed"));
    assert_eq!(h.diagnostics.stats().audits_failed, 1);
}

#[tokio::test]
async fn interactive_disclosure_without_suspension() {
    let config = OverlayConfig {
        suspend_while_interactive: false,
        ..OverlayConfig::default()
    };
    let h = harness(
        Arc::new(StaticOracle::new(sample_violations())),
        sample_host(),
        config,
    );
    h.overlay.mount(SubtreeRef::from("app")).await.unwrap();
    h.executor.run_pending().await;

    h.overlay.handle_key(&toggle_press()).await.unwrap();
    assert_eq!(h.host.marker_count(), 0);
    h.executor.run_pending().await;
    assert_eq!(h.host.marker_for("#hey").unwrap().1, MarkerRole::Button);

    let hey = TargetSelector::from("#hey");
    let yo = TargetSelector::from("#yo");
    let opened = h.overlay.press(Some((&hey, HitRegion::Marker)), PointerButton::Primary).await;
    assert_eq!(opened, vec![(hey.clone(), DisclosureState::Open)]);

    // Pressing inside the open panel keeps it open.
    let inside = h.overlay.press(Some((&hey, HitRegion::Panel)), PointerButton::Primary).await;
    assert!(inside.is_empty());

    // Pressing another marker closes the first panel and opens the second.
    let switched = h.overlay.press(Some((&yo, HitRegion::Marker)), PointerButton::Primary).await;
    assert_eq!(
        switched,
        vec![
            (hey.clone(), DisclosureState::Closed),
            (yo.clone(), DisclosureState::Open)
        ]
    );
    assert_eq!(h.host.panel_titles(), vec!["#yo".to_string()]);

    let closed = h
        .overlay
        .dispatch(&yo, DisclosureEvent::FocusLost { to: HitRegion::Outside })
        .await
        .unwrap();
    assert_eq!(closed, Some(DisclosureState::Closed));
}

#[tokio::test]
async fn unmount_removes_everything() {
    let h = harness(
        Arc::new(StaticOracle::new(sample_violations())),
        sample_host(),
        OverlayConfig::default(),
    );
    h.overlay.mount(SubtreeRef::from("app")).await.unwrap();
    h.executor.run_pending().await;
    h.overlay.watch_activation();

    h.overlay.unmount().await;
    assert_eq!(h.host.marker_count(), 0);
    assert!(matches!(
        h.overlay.subtree_changed(SubtreeRef::from("app")).await,
        Err(OverlayError::NotMounted)
    ));
}

#[tokio::test]
async fn activation_watcher_follows_external_flag_changes() {
    let h = harness(
        Arc::new(StaticOracle::new(sample_violations())),
        sample_host(),
        OverlayConfig::default(),
    );
    h.overlay.mount(SubtreeRef::from("app")).await.unwrap();
    h.executor.run_pending().await;
    h.overlay.watch_activation();

    h.overlay.activation().set_disabled(true);
    tokio::time::sleep(Duration::from_millis(10)).await;
    let snapshot = h.overlay.snapshot().await;
    assert!(snapshot.disabled);
    assert!(snapshot.suspended);
    assert_eq!(h.host.marker_count(), 0);
}
