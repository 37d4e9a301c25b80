use std::time::Duration;

use axemode_core_types::{CycleId, SubtreeRef, TargetSelector};
use axemode_state_center::ActivationFlags;
use tracing::{debug, info, warn};

use crate::disclosure::DisclosureState;

pub fn emit_activation(flags: ActivationFlags, suspended: bool) {
    info!(
        target: "axemode.overlay",
        disabled = flags.disabled,
        interactive = flags.interactive,
        suspended,
        "overlay.activation.applied"
    );
}

pub fn emit_cycle_completed(
    cycle: CycleId,
    root: &SubtreeRef,
    violations: usize,
    targets: usize,
    tracked: usize,
    duration: Duration,
) {
    info!(
        target: "axemode.overlay",
        %cycle,
        %root,
        violations,
        targets,
        tracked,
        elapsed_ms = duration.as_millis() as u64,
        "overlay.cycle.completed"
    );
}

pub fn emit_audit_failed(root: &SubtreeRef, error: &str) {
    warn!(target: "axemode.overlay", %root, error, "overlay.audit.failed");
}

pub fn emit_discarded(root: &SubtreeRef, reason: &str) {
    debug!(target: "axemode.overlay", %root, reason, "overlay.audit.discarded");
}

pub fn emit_lookup_failed(cycle: CycleId, selector: &TargetSelector, reason: &str) {
    debug!(
        target: "axemode.overlay",
        %cycle,
        %selector,
        reason,
        "overlay.lookup.failed"
    );
}

pub fn emit_disclosure(selector: &TargetSelector, state: DisclosureState) {
    debug!(
        target: "axemode.overlay",
        %selector,
        open = state == DisclosureState::Open,
        "overlay.disclosure.changed"
    );
}
