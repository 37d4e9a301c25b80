use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct PolicySnapshot {
    pub rev: u64,
    pub activation: ActivationPolicy,
    pub scheduler: SchedulerPolicy,
    pub tracker: TrackerPolicy,
    pub oracle: OraclePolicy,
    pub diagnostics: DiagnosticsPolicy,
    pub provenance: BTreeMap<String, PolicyProvenance>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct ActivationPolicy {
    /// Suppresses the overlay entirely.
    pub disabled: bool,
    /// When false the interactive flag only switches disclosure mode instead of suspending.
    pub suspend_while_interactive: bool,
    /// Keyboard chord flipping the interactive flag, e.g. `ctrl+.`.
    pub shortcut: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct SchedulerPolicy {
    pub idle_delay_ms: u64,
    /// Skip the idle executor and run audits inline.
    pub force_sync: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct TrackerPolicy {
    pub frame_interval_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct OraclePolicy {
    pub reporter: String,
    pub timeout_ms: u64,
    pub command: Option<String>,
    pub args: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct DiagnosticsPolicy {
    pub capacity: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicyProvenance {
    pub path: String,
    pub source: PolicySource,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PolicySource {
    Builtin,
    File,
    Env,
    Cli,
}

impl PolicySnapshot {
    pub fn set_provenance(&mut self, path: &str, source: PolicySource) {
        self.provenance.insert(
            path.to_string(),
            PolicyProvenance {
                path: path.to_string(),
                source,
            },
        );
    }

    pub fn source_of(&self, path: &str) -> Option<PolicySource> {
        self.provenance.get(path).map(|entry| entry.source)
    }
}
