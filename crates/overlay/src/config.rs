use std::time::Duration;

use axemode_audit_oracle::AuditOptions;
use axemode_policy_center::{default_snapshot, PolicySnapshot};
use axemode_scheduler::SchedulerConfig;
use axemode_state_center::ActivationFlags;

use crate::errors::OverlayError;
use crate::mode::{Modifier, ShortcutChord};

/// Runtime settings of one overlay instance, derived from a policy snapshot.
#[derive(Clone, Debug)]
pub struct OverlayConfig {
    pub initial_flags: ActivationFlags,
    pub suspend_while_interactive: bool,
    pub shortcut: ShortcutChord,
    pub scheduler: SchedulerConfig,
    pub frame_interval: Duration,
    pub audit: AuditOptions,
}

impl OverlayConfig {
    pub fn from_policy(policy: &PolicySnapshot) -> Result<Self, OverlayError> {
        Ok(Self {
            initial_flags: ActivationFlags::new(policy.activation.disabled, false),
            suspend_while_interactive: policy.activation.suspend_while_interactive,
            shortcut: policy.activation.shortcut.parse()?,
            scheduler: SchedulerConfig {
                idle_delay: Duration::from_millis(policy.scheduler.idle_delay_ms),
                force_sync: policy.scheduler.force_sync,
            },
            frame_interval: Duration::from_millis(policy.tracker.frame_interval_ms),
            audit: AuditOptions {
                reporter: policy.oracle.reporter.clone(),
                timeout: Duration::from_millis(policy.oracle.timeout_ms),
            },
        })
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        let policy = default_snapshot();
        Self {
            initial_flags: ActivationFlags::default(),
            suspend_while_interactive: policy.activation.suspend_while_interactive,
            shortcut: ShortcutChord {
                modifier: Modifier::Control,
                key: ".".into(),
            },
            scheduler: SchedulerConfig {
                idle_delay: Duration::from_millis(policy.scheduler.idle_delay_ms),
                force_sync: policy.scheduler.force_sync,
            },
            frame_interval: Duration::from_millis(policy.tracker.frame_interval_ms),
            audit: AuditOptions::default(),
        }
    }
}
