//! Scripted sessions: a list of host-side steps replayed against a live overlay.

use std::sync::Arc;
use std::time::Duration;

use axemode_core_types::{Rect, SubtreeRef, TargetSelector};
use axemode_overlay::{
    AxeMode, DisclosureEvent, DisclosureState, HitRegion, KeyPress, OverlayError, PointerButton,
};
use axemode_scheduler::ManualIdleExecutor;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::SessionError;
use crate::host::{ElementSpec, InMemoryHost};

fn default_root() -> String {
    "app".to_string()
}

fn default_region() -> HitRegion {
    HitRegion::Marker
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Script {
    #[serde(default = "default_root")]
    pub root: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// The watched subtree changed; `root` switches to a new subtree reference.
    SubtreeChanged {
        #[serde(default)]
        root: Option<String>,
    },
    /// Moves or resizes an element.
    Layout { target: String, rect: Rect },
    Insert {
        target: String,
        #[serde(flatten)]
        spec: ElementSpec,
    },
    Remove { target: String },
    /// A gesture delivered to one target only.
    Gesture {
        target: String,
        #[serde(flatten)]
        event: DisclosureEvent,
    },
    /// A document-level press; `target` is the marker or panel that was hit, if any.
    Press {
        #[serde(default)]
        target: Option<String>,
        #[serde(default = "default_region")]
        region: HitRegion,
        #[serde(default)]
        button: PointerButton,
    },
    /// A key press such as `a` or `ctrl+.`, routed to the mode toggle.
    Key { chord: String },
    SetDisabled { disabled: bool },
    /// Runs the idle work queued so far.
    Idle,
    Wait { ms: u64 },
}

impl Step {
    fn label(&self) -> &'static str {
        match self {
            Step::SubtreeChanged { .. } => "subtree_changed",
            Step::Layout { .. } => "layout",
            Step::Insert { .. } => "insert",
            Step::Remove { .. } => "remove",
            Step::Gesture { .. } => "gesture",
            Step::Press { .. } => "press",
            Step::Key { .. } => "key",
            Step::SetDisabled { .. } => "set_disabled",
            Step::Idle => "idle",
            Step::Wait { .. } => "wait",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct StepRecord {
    pub index: usize,
    pub step: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transitions: Vec<(TargetSelector, DisclosureState)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl StepRecord {
    fn new(index: usize, step: &Step) -> Self {
        Self {
            index,
            step: step.label(),
            transitions: Vec::new(),
            note: None,
        }
    }
}

/// Everything a scripted session drives.
pub struct Session<'a> {
    pub overlay: &'a Arc<AxeMode>,
    pub host: &'a InMemoryHost,
    pub idle: &'a ManualIdleExecutor,
}

impl Session<'_> {
    /// Mounts the overlay on the script's root, replays every step, then drains idle work.
    pub async fn run(&self, script: &Script) -> Result<Vec<StepRecord>, SessionError> {
        let mut root = SubtreeRef::from(script.root.as_str());
        self.overlay.mount(root.clone()).await?;
        info!(target: "axemode.session", %root, steps = script.steps.len(), "session.started");

        let mut records = Vec::with_capacity(script.steps.len());
        for (index, step) in script.steps.iter().enumerate() {
            let record = self.apply(index, step, &mut root).await?;
            debug!(
                target: "axemode.session",
                index,
                step = record.step,
                transitions = record.transitions.len(),
                "session.step.applied"
            );
            records.push(record);
        }

        let drained = self.idle.run_pending().await;
        if drained > 0 {
            self.settle().await;
        }
        Ok(records)
    }

    async fn apply(
        &self,
        index: usize,
        step: &Step,
        root: &mut SubtreeRef,
    ) -> Result<StepRecord, SessionError> {
        let mut record = StepRecord::new(index, step);
        match step {
            Step::SubtreeChanged { root: next } => {
                if let Some(next) = next {
                    *root = SubtreeRef::from(next.as_str());
                }
                let scheduled = self.overlay.subtree_changed(root.clone()).await?;
                if !scheduled {
                    record.note = Some("suspended; no audit scheduled".into());
                }
            }
            Step::Layout { target, rect } => {
                if !self.host.set_rect(target, *rect) {
                    return Err(SessionError::step(index, format!("unknown element {target}")));
                }
                self.settle().await;
            }
            Step::Insert { target, spec } => {
                self.host.insert(target, spec.clone());
            }
            Step::Remove { target } => {
                if !self.host.remove(target) {
                    record.note = Some(format!("{target} was not present"));
                }
            }
            Step::Gesture { target, event } => {
                let selector = TargetSelector::from(target.as_str());
                match self.overlay.dispatch(&selector, event.clone()).await {
                    Ok(Some(state)) => record.transitions.push((selector, state)),
                    Ok(None) => {}
                    Err(OverlayError::UnknownTarget(selector)) => {
                        record.note = Some(format!("no marker for {selector}"));
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            Step::Press {
                target,
                region,
                button,
            } => {
                let selector = target.as_deref().map(TargetSelector::from);
                let hit = selector.as_ref().map(|selector| (selector, *region));
                record.transitions = self.overlay.press(hit, *button).await;
            }
            Step::Key { chord } => {
                let press: KeyPress = chord
                    .parse()
                    .map_err(|err: OverlayError| SessionError::step(index, err.to_string()))?;
                if let Some(interactive) = self.overlay.handle_key(&press).await? {
                    record.note = Some(format!("interactive={interactive}"));
                }
            }
            Step::SetDisabled { disabled } => {
                self.overlay.set_disabled(*disabled).await?;
            }
            Step::Idle => {
                let ran = self.idle.run_pending().await;
                record.note = Some(format!("ran {ran} idle job(s)"));
                self.settle().await;
            }
            Step::Wait { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
        }
        Ok(record)
    }

    /// Gives geometry feeds a couple of frames to propagate.
    async fn settle(&self) {
        tokio::time::sleep(self.host.frame_interval() * 2).await;
    }
}
