//! The overlay driver: audits a subtree on change and keeps one marker per offending element.

use std::sync::{Arc, Weak};
use std::time::Instant;

use axemode_audit_oracle::AuditOracle;
use axemode_core_types::{CycleId, MarkerId, Rect, SubtreeRef, TargetSelector, Violation};
use axemode_scheduler::AuditScheduler;
use axemode_state_center::{
    ActivationCenter, ActivationFlags, OverlayEvent, OverlayEventKind, StateCenter,
};
use serde::Serialize;
use tokio::select;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::OverlayConfig;
use crate::disclosure::{
    Disclosure, DisclosureEvent, DisclosureMode, DisclosureState, HitRegion, PointerButton,
};
use crate::errors::OverlayError;
use crate::events;
use crate::mode::{KeyPress, ModeToggle};
use crate::panel::PanelView;
use crate::ports::{ElementLookup, MarkerRole, NameResolver, OverlaySurface};
use crate::segment::{segment, ViolationsByTarget};
use crate::tracker::PositionTracker;

/// Host collaborators of one overlay.
#[derive(Clone)]
pub struct OverlayDeps {
    pub oracle: Arc<dyn AuditOracle>,
    pub lookup: Arc<dyn ElementLookup>,
    pub surface: Arc<dyn OverlaySurface>,
    pub names: Option<Arc<dyn NameResolver>>,
    pub state_center: Arc<dyn StateCenter>,
}

#[derive(Clone, Debug, Serialize)]
pub struct EntrySnapshot {
    pub selector: TargetSelector,
    pub marker: MarkerId,
    pub role: MarkerRole,
    pub rect: Rect,
    pub state: DisclosureState,
    pub violations: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct OverlaySnapshot {
    pub cycle: CycleId,
    pub root: Option<SubtreeRef>,
    pub mounted: bool,
    pub disabled: bool,
    pub interactive: bool,
    pub suspended: bool,
    pub mode: DisclosureMode,
    pub pending_audit: bool,
    pub last_error: Option<String>,
    pub targets: ViolationsByTarget,
    pub entries: Vec<EntrySnapshot>,
}

struct Entry {
    selector: TargetSelector,
    violations: Vec<Violation>,
    tracker: PositionTracker,
    disclosure: Disclosure,
}

impl Entry {
    fn role(&self) -> MarkerRole {
        role_for(&self.disclosure)
    }
}

struct CycleState {
    root: Option<SubtreeRef>,
    mounted: bool,
    flags: ActivationFlags,
    suspended: bool,
    mode: DisclosureMode,
    // Bumped by every audit request, suspension and unmount; results carrying an older
    // generation are dropped.
    generation: u64,
    cycle: CycleId,
    segments: ViolationsByTarget,
    entries: Vec<Entry>,
    last_error: Option<String>,
}

pub struct AxeMode {
    config: OverlayConfig,
    deps: OverlayDeps,
    activation: Arc<ActivationCenter>,
    toggle: ModeToggle,
    scheduler: AuditScheduler,
    state: Mutex<CycleState>,
    watcher: parking_lot::Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl AxeMode {
    /// Builds an overlay with its own activation flags and the configured scheduler.
    pub fn new(config: OverlayConfig, deps: OverlayDeps) -> Arc<Self> {
        let activation = Arc::new(ActivationCenter::new(config.initial_flags));
        let scheduler = AuditScheduler::from_config(&config.scheduler);
        Self::with_parts(config, deps, activation, scheduler)
    }

    pub fn with_parts(
        config: OverlayConfig,
        deps: OverlayDeps,
        activation: Arc<ActivationCenter>,
        scheduler: AuditScheduler,
    ) -> Arc<Self> {
        let flags = activation.current();
        let suspended = flags.suspended(config.suspend_while_interactive);
        let toggle = ModeToggle::new(config.shortcut.clone(), Arc::clone(&activation));
        Arc::new(Self {
            state: Mutex::new(CycleState {
                root: None,
                mounted: false,
                flags,
                suspended,
                mode: mode_for(flags),
                generation: 0,
                cycle: CycleId::default(),
                segments: ViolationsByTarget::default(),
                entries: Vec::new(),
                last_error: None,
            }),
            config,
            deps,
            activation,
            toggle,
            scheduler,
            watcher: parking_lot::Mutex::new(None),
        })
    }

    pub fn activation(&self) -> Arc<ActivationCenter> {
        Arc::clone(&self.activation)
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    /// Starts watching `root` and requests the first audit unless suspended.
    pub async fn mount(self: &Arc<Self>, root: SubtreeRef) -> Result<bool, OverlayError> {
        {
            let mut state = self.state.lock().await;
            let flags = self.activation.current();
            debug!(target: "axemode.overlay", %root, "overlay.mounted");
            state.root = Some(root);
            state.mounted = true;
            state.flags = flags;
            state.suspended = flags.suspended(self.config.suspend_while_interactive);
            state.mode = mode_for(flags);
        }
        self.request_audit().await
    }

    /// The watched subtree changed; schedules a debounced re-audit.
    pub async fn subtree_changed(self: &Arc<Self>, root: SubtreeRef) -> Result<bool, OverlayError> {
        {
            let mut state = self.state.lock().await;
            if !state.mounted {
                return Err(OverlayError::NotMounted);
            }
            state.root = Some(root);
        }
        self.request_audit().await
    }

    /// Follows activation changes made by other holders of the flags.
    pub fn watch_activation(self: &Arc<Self>) {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let weak: Weak<Self> = Arc::downgrade(self);
        let mut rx = self.activation.subscribe();
        let task = tokio::spawn(async move {
            loop {
                select! {
                    _ = token.cancelled() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let flags = *rx.borrow_and_update();
                        let Some(this) = weak.upgrade() else { break };
                        if let Err(err) = this.apply_flags(flags).await {
                            warn!(target: "axemode.overlay", %err, "overlay.activation.apply_failed");
                        }
                    }
                }
            }
            debug!(target: "axemode.overlay", "activation watcher exited");
        });
        if let Some((previous, handle)) = self.watcher.lock().replace((cancel, task)) {
            previous.cancel();
            handle.abort();
        }
    }

    /// Routes a key press to the mode toggle. Returns the new interactive value on a match.
    pub async fn handle_key(self: &Arc<Self>, press: &KeyPress) -> Result<Option<bool>, OverlayError> {
        match self.toggle.handle_key(press) {
            Some(interactive) => {
                self.apply_flags(self.activation.current()).await?;
                Ok(Some(interactive))
            }
            None => Ok(None),
        }
    }

    pub async fn set_disabled(self: &Arc<Self>, disabled: bool) -> Result<(), OverlayError> {
        self.activation.set_disabled(disabled);
        self.apply_flags(self.activation.current()).await
    }

    /// Reconciles the overlay with `flags`. Suspension tears down every marker and drops any
    /// pending or in-flight audit; reactivation starts a fresh cycle.
    pub async fn apply_flags(self: &Arc<Self>, flags: ActivationFlags) -> Result<(), OverlayError> {
        let suspended = flags.suspended(self.config.suspend_while_interactive);
        let mode = mode_for(flags);
        let restart = {
            let mut state = self.state.lock().await;
            if state.flags == flags {
                return Ok(());
            }
            let was_suspended = state.suspended;
            let previous_mode = state.mode;
            state.flags = flags;
            state.suspended = suspended;
            state.mode = mode;
            events::emit_activation(flags, suspended);
            self.record(
                state.cycle,
                OverlayEventKind::ActivationChanged {
                    disabled: flags.disabled,
                    interactive: flags.interactive,
                    suspended,
                },
            )
            .await;

            if suspended {
                if !was_suspended {
                    state.generation += 1;
                    self.scheduler.cancel();
                    self.clear_cycle(&mut state).await;
                }
                false
            } else if was_suspended || previous_mode != mode {
                state.generation += 1;
                self.clear_cycle(&mut state).await;
                state.mounted
            } else {
                false
            }
        };
        if restart {
            self.request_audit().await?;
        }
        Ok(())
    }

    /// Feeds one gesture to a single target's disclosure.
    pub async fn dispatch(
        &self,
        selector: &TargetSelector,
        event: DisclosureEvent,
    ) -> Result<Option<DisclosureState>, OverlayError> {
        let mut state = self.state.lock().await;
        if state.suspended || !state.mounted {
            return Ok(None);
        }
        let cycle = state.cycle;
        let entry = state
            .entries
            .iter_mut()
            .find(|entry| &entry.selector == selector)
            .ok_or_else(|| OverlayError::UnknownTarget(selector.clone()))?;
        let transition = entry.disclosure.handle(&event);
        if let Some(next) = transition {
            self.show_or_hide(cycle, entry, next).await;
        }
        Ok(transition)
    }

    /// A pointer press somewhere in the document. `hit` names the target whose marker or
    /// panel was hit; every other target sees the press as outside.
    pub async fn press(
        &self,
        hit: Option<(&TargetSelector, HitRegion)>,
        button: PointerButton,
    ) -> Vec<(TargetSelector, DisclosureState)> {
        let mut state = self.state.lock().await;
        if state.suspended || !state.mounted {
            return Vec::new();
        }
        let cycle = state.cycle;
        let mut transitions = Vec::new();
        for entry in state.entries.iter_mut() {
            let region = match hit {
                Some((selector, region)) if selector == &entry.selector => region,
                _ => HitRegion::Outside,
            };
            if let Some(next) = entry
                .disclosure
                .handle(&DisclosureEvent::Press { region, button })
            {
                self.show_or_hide(cycle, entry, next).await;
                transitions.push((entry.selector.clone(), next));
            }
        }
        transitions
    }

    pub async fn snapshot(&self) -> OverlaySnapshot {
        let state = self.state.lock().await;
        OverlaySnapshot {
            cycle: state.cycle,
            root: state.root.clone(),
            mounted: state.mounted,
            disabled: state.flags.disabled,
            interactive: state.flags.interactive,
            suspended: state.suspended,
            mode: state.mode,
            pending_audit: self.scheduler.has_pending(),
            last_error: state.last_error.clone(),
            targets: state.segments.clone(),
            entries: state
                .entries
                .iter()
                .map(|entry| EntrySnapshot {
                    selector: entry.selector.clone(),
                    marker: entry.tracker.marker().clone(),
                    role: entry.role(),
                    rect: entry.tracker.rect(),
                    state: entry.disclosure.state(),
                    violations: entry.violations.iter().map(|v| v.id.clone()).collect(),
                })
                .collect(),
        }
    }

    /// Cancels pending work, removes every marker and stops following activation changes.
    pub async fn unmount(&self) {
        let watcher = self.watcher.lock().take();
        if let Some((cancel, handle)) = watcher {
            cancel.cancel();
            let _ = handle.await;
        }
        self.scheduler.teardown();
        let mut state = self.state.lock().await;
        state.generation += 1;
        state.mounted = false;
        self.clear_cycle(&mut state).await;
        debug!(target: "axemode.overlay", "overlay.unmounted");
    }

    async fn request_audit(self: &Arc<Self>) -> Result<bool, OverlayError> {
        let (root, generation, cycle) = {
            let mut state = self.state.lock().await;
            if !state.mounted || state.suspended {
                return Ok(false);
            }
            let Some(root) = state.root.clone() else {
                return Ok(false);
            };
            state.generation += 1;
            (root, state.generation, state.cycle)
        };

        self.record(
            cycle,
            OverlayEventKind::AuditScheduled {
                subtree: root.clone(),
                superseded: self.scheduler.has_pending(),
            },
        )
        .await;

        let weak = Arc::downgrade(self);
        self.scheduler
            .schedule(async move {
                if let Some(this) = weak.upgrade() {
                    this.run_cycle(generation, root).await;
                }
            })
            .await?;
        Ok(true)
    }

    async fn run_cycle(&self, generation: u64, root: SubtreeRef) {
        let started = Instant::now();
        let result = self
            .deps
            .oracle
            .run_audit(&root, &self.config.audit)
            .await;

        let mut state = self.state.lock().await;
        let stale = if !state.mounted {
            Some("unmounted")
        } else if state.suspended {
            Some("suspended")
        } else if state.generation != generation {
            Some("superseded")
        } else {
            None
        };
        if let Some(reason) = stale {
            events::emit_discarded(&root, reason);
            self.record(
                state.cycle,
                OverlayEventKind::AuditDiscarded {
                    reason: reason.to_string(),
                },
            )
            .await;
            return;
        }

        let violations = match result {
            Ok(violations) => violations,
            Err(err) => {
                // Markers from the last good cycle stay in place.
                let error = err.to_string();
                events::emit_audit_failed(&root, &error);
                state.last_error = Some(error.clone());
                self.record(state.cycle, OverlayEventKind::AuditFailed { error })
                    .await;
                return;
            }
        };

        self.clear_cycle(&mut state).await;
        state.cycle = state.cycle.next();
        state.last_error = None;
        let segments = segment(&violations);
        self.install(&mut state, &root, &segments).await;
        let targets = segments.len();
        state.segments = segments;

        events::emit_cycle_completed(
            state.cycle,
            &root,
            violations.len(),
            targets,
            state.entries.len(),
            started.elapsed(),
        );
        self.record(
            state.cycle,
            OverlayEventKind::AuditCompleted {
                violations: violations.len(),
                targets,
            },
        )
        .await;
    }

    async fn install(&self, state: &mut CycleState, root: &SubtreeRef, segments: &ViolationsByTarget) {
        for group in segments.iter() {
            let source = match self.deps.lookup.resolve(root, &group.target) {
                Ok(source) => source,
                Err(err) => {
                    let reason = err.to_string();
                    events::emit_lookup_failed(state.cycle, &group.target, &reason);
                    self.record(
                        state.cycle,
                        OverlayEventKind::LookupFailed {
                            selector: group.target.clone(),
                            reason,
                        },
                    )
                    .await;
                    continue;
                }
            };
            let disclosure = Disclosure::new(state.mode);
            let tracker = PositionTracker::start(
                group.target.clone(),
                source,
                Arc::clone(&self.deps.surface),
                role_for(&disclosure),
            );
            self.record(
                state.cycle,
                OverlayEventKind::MarkerInstalled {
                    selector: group.target.clone(),
                    marker: tracker.marker().clone(),
                },
            )
            .await;
            state.entries.push(Entry {
                selector: group.target.clone(),
                violations: group.violations.clone(),
                tracker,
                disclosure,
            });
        }
    }

    /// Tears down every entry of the current cycle; each tracker has fully stopped before
    /// this returns.
    async fn clear_cycle(&self, state: &mut CycleState) {
        let cycle = state.cycle;
        for mut entry in state.entries.drain(..) {
            if entry.disclosure.close() {
                self.deps.surface.hide_panel(entry.tracker.marker());
            }
            let marker = entry.tracker.marker().clone();
            entry.tracker.stop().await;
            self.record(
                cycle,
                OverlayEventKind::MarkerRemoved {
                    selector: entry.selector,
                    marker,
                },
            )
            .await;
        }
        state.segments = ViolationsByTarget::default();
    }

    async fn show_or_hide(&self, cycle: CycleId, entry: &Entry, next: DisclosureState) {
        let marker = entry.tracker.marker();
        match next {
            DisclosureState::Open => {
                let panel =
                    PanelView::build(&entry.selector, &entry.violations, self.deps.names.as_deref());
                self.deps.surface.show_panel(marker, &panel, entry.tracker.rect());
            }
            DisclosureState::Closed => self.deps.surface.hide_panel(marker),
        }
        events::emit_disclosure(&entry.selector, next);
        self.record(
            cycle,
            OverlayEventKind::DisclosureChanged {
                selector: entry.selector.clone(),
                open: next == DisclosureState::Open,
            },
        )
        .await;
    }

    async fn record(&self, cycle: CycleId, kind: OverlayEventKind) {
        if let Err(err) = self
            .deps
            .state_center
            .append(OverlayEvent::new(cycle, kind))
            .await
        {
            warn!(target: "axemode.overlay", %err, "overlay.diagnostics.append_failed");
        }
    }
}

impl Drop for AxeMode {
    fn drop(&mut self) {
        if let Some((cancel, _handle)) = self.watcher.lock().take() {
            cancel.cancel();
        }
    }
}

fn mode_for(flags: ActivationFlags) -> DisclosureMode {
    if flags.interactive {
        DisclosureMode::Interactive
    } else {
        DisclosureMode::Passive
    }
}

fn role_for(disclosure: &Disclosure) -> MarkerRole {
    if disclosure.focusable() {
        MarkerRole::Button
    } else {
        MarkerRole::Decorative
    }
}
