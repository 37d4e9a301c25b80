use crate::model::{
    ActivationPolicy, DiagnosticsPolicy, OraclePolicy, PolicySnapshot, SchedulerPolicy,
    TrackerPolicy,
};

pub const DEFAULT_SHORTCUT: &str = "ctrl+.";
pub const DEFAULT_REPORTER: &str = "v2";

pub fn default_snapshot() -> PolicySnapshot {
    PolicySnapshot {
        rev: 1,
        activation: ActivationPolicy {
            disabled: false,
            suspend_while_interactive: true,
            shortcut: DEFAULT_SHORTCUT.to_string(),
        },
        scheduler: SchedulerPolicy {
            idle_delay_ms: 50,
            force_sync: false,
        },
        tracker: TrackerPolicy {
            frame_interval_ms: 16,
        },
        oracle: OraclePolicy {
            reporter: DEFAULT_REPORTER.to_string(),
            timeout_ms: 10_000,
            command: None,
            args: Vec::new(),
        },
        diagnostics: DiagnosticsPolicy { capacity: 512 },
        provenance: Default::default(),
    }
}
