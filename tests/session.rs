use std::sync::Arc;
use std::time::Duration;

use axe_mode::host::{InMemoryHost, PageFixture};
use axe_mode::script::{Script, Session};
use axemode_audit_oracle::StaticOracle;
use axemode_core_types::{AffectedNode, Rect, TargetSelector, Violation};
use axemode_overlay::{
    AxeMode, DisclosureState, MarkerRole, NameResolver, OverlayConfig, OverlayDeps,
};
use axemode_scheduler::{AuditScheduler, IdleExecutor, ManualIdleExecutor};
use axemode_state_center::{ActivationCenter, InMemoryStateCenter};

fn violation(id: &str, targets: &[&str]) -> Violation {
    Violation {
        id: id.into(),
        nodes: targets
            .iter()
            .map(|t| AffectedNode {
                target: vec![(*t).into()],
                ..AffectedNode::default()
            })
            .collect(),
        ..Violation::default()
    }
}

fn page() -> PageFixture {
    serde_yaml::from_str(
        r##"
elements:
  "#a": { x: 0, y: 0, width: 50, height: 10, name: Alpha }
  "#b": { x: 0, y: 20, width: 50, height: 10 }
"##,
    )
    .unwrap()
}

struct Setup {
    overlay: Arc<AxeMode>,
    host: Arc<InMemoryHost>,
    idle: Arc<ManualIdleExecutor>,
    oracle: Arc<StaticOracle>,
}

fn setup(config: OverlayConfig) -> Setup {
    let oracle = Arc::new(StaticOracle::new(vec![
        violation("rule-1", &["#a"]),
        violation("rule-2", &["#a", "#b"]),
    ]));
    let host = Arc::new(InMemoryHost::new(page(), Duration::from_millis(16)));
    let idle = Arc::new(ManualIdleExecutor::new());
    let deps = OverlayDeps {
        oracle: oracle.clone(),
        lookup: host.clone(),
        surface: host.clone(),
        names: Some(host.clone() as Arc<dyn NameResolver>),
        state_center: Arc::new(InMemoryStateCenter::new(64)),
    };
    let activation = Arc::new(ActivationCenter::new(config.initial_flags));
    let scheduler = AuditScheduler::new(Some(idle.clone() as Arc<dyn IdleExecutor>));
    let overlay = AxeMode::with_parts(config, deps, activation, scheduler);
    Setup {
        overlay,
        host,
        idle,
        oracle,
    }
}

fn script(yaml: &str) -> Script {
    serde_yaml::from_str(yaml).unwrap()
}

#[tokio::test(start_paused = true)]
async fn markers_track_layout_changes() {
    let s = setup(OverlayConfig::default());
    let session = Session {
        overlay: &s.overlay,
        host: &s.host,
        idle: &s.idle,
    };
    session
        .run(&script(
            r##"
steps:
  - step: idle
  - step: layout
    target: "#b"
    rect: { x: 300, y: 20, width: 50, height: 10 }
"##,
        ))
        .await
        .unwrap();

    let b = s.host.marker_for("#b").unwrap();
    assert_eq!(b.rect.x, 300.0);
    assert_eq!(b.role, MarkerRole::Decorative);
    assert_eq!(s.host.markers().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn passive_panel_uses_display_name() {
    let s = setup(OverlayConfig::default());
    let session = Session {
        overlay: &s.overlay,
        host: &s.host,
        idle: &s.idle,
    };
    let records = session
        .run(&script(
            r##"
steps:
  - step: idle
  - step: gesture
    target: "#a"
    event: pointer_enter
  - step: gesture
    target: "#missing"
    event: pointer_enter
"##,
        ))
        .await
        .unwrap();

    assert_eq!(
        records[1].transitions,
        vec![(TargetSelector::from("#a"), DisclosureState::Open)]
    );
    assert!(records[2].note.as_deref().unwrap().contains("#missing"));
    let panels = s.host.visible_panels();
    assert_eq!(panels.len(), 1);
    assert_eq!(panels[0].title, "Alpha");
    let ids: Vec<&str> = panels[0].sections.iter().map(|s| s.violation_id.as_str()).collect();
    assert_eq!(ids, vec!["rule-1", "rule-2"]);
}

#[tokio::test(start_paused = true)]
async fn removed_element_is_skipped_on_next_cycle() {
    let s = setup(OverlayConfig::default());
    let session = Session {
        overlay: &s.overlay,
        host: &s.host,
        idle: &s.idle,
    };
    session
        .run(&script(
            r##"
steps:
  - step: idle
  - step: remove
    target: "#b"
  - step: subtree_changed
  - step: subtree_changed
    root: app-v2
  - step: idle
"##,
        ))
        .await
        .unwrap();

    assert_eq!(s.oracle.calls(), 2);
    assert_eq!(s.oracle.audited().last().unwrap().0, "app-v2");
    assert!(s.host.marker_for("#b").is_none());
    assert!(s.host.marker_for("#a").is_some());
}

#[tokio::test(start_paused = true)]
async fn interactive_session_without_suspension() {
    let config = OverlayConfig {
        suspend_while_interactive: false,
        ..OverlayConfig::default()
    };
    let s = setup(config);
    let session = Session {
        overlay: &s.overlay,
        host: &s.host,
        idle: &s.idle,
    };
    let records = session
        .run(&script(
            r##"
steps:
  - step: idle
  - step: key
    chord: ctrl+.
  - step: idle
  - step: press
    target: "#a"
  - step: gesture
    target: "#a"
    event: press
    region: panel
  - step: press
"##,
        ))
        .await
        .unwrap();

    assert_eq!(s.host.marker_for("#a").unwrap().role, MarkerRole::Button);
    assert_eq!(records[3].transitions, vec![(TargetSelector::from("#a"), DisclosureState::Open)]);
    assert!(records[4].transitions.is_empty());
    assert_eq!(records[5].transitions, vec![(TargetSelector::from("#a"), DisclosureState::Closed)]);
    assert!(s.host.visible_panels().is_empty());
}

#[tokio::test(start_paused = true)]
async fn open_panel_follows_moved_element() {
    let s = setup(OverlayConfig::default());
    let session = Session {
        overlay: &s.overlay,
        host: &s.host,
        idle: &s.idle,
    };
    session
        .run(&script(
            r##"
steps:
  - step: idle
  - step: gesture
    target: "#a"
    event: pointer_enter
  - step: layout
    target: "#a"
    rect: { x: 120, y: 40, width: 50, height: 10 }
"##,
        ))
        .await
        .unwrap();

    let moved = Rect::new(120.0, 40.0, 50.0, 10.0);
    assert_eq!(s.host.marker_for("#a").unwrap().rect, moved);
    assert_eq!(s.host.panel_anchor("#a"), Some(moved));
}

#[tokio::test(start_paused = true)]
async fn plain_key_passes_through_toggle() {
    let s = setup(OverlayConfig::default());
    let session = Session {
        overlay: &s.overlay,
        host: &s.host,
        idle: &s.idle,
    };
    let records = session
        .run(&script(
            r##"
steps:
  - step: idle
  - step: key
    chord: a
  - step: key
    chord: shift+.
"##,
        ))
        .await
        .unwrap();

    assert!(records[1].note.is_none());
    assert!(records[2].note.is_none());
    let snapshot = s.overlay.snapshot().await;
    assert!(!snapshot.interactive);
    assert_eq!(s.host.markers().len(), 2);
}
