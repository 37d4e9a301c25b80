use serde_json::Value;
use tracing::debug;

use crate::errors::PolicyError;
use crate::model::{PolicySnapshot, PolicySource};

/// Applies a single `section.key = value` override, recording provenance when it changes
/// the snapshot. Unknown paths are rejected.
pub fn apply_override(
    snapshot: &mut PolicySnapshot,
    path: &str,
    value: &Value,
    source: PolicySource,
) -> Result<(), PolicyError> {
    let changed = match path {
        "activation.disabled" => merge(&mut snapshot.activation.disabled, to_bool(value)?),
        "activation.suspend_while_interactive" => merge(
            &mut snapshot.activation.suspend_while_interactive,
            to_bool(value)?,
        ),
        "activation.shortcut" => merge(&mut snapshot.activation.shortcut, to_string(value)?),
        "scheduler.idle_delay_ms" => merge(&mut snapshot.scheduler.idle_delay_ms, to_u64(value)?),
        "scheduler.force_sync" => merge(&mut snapshot.scheduler.force_sync, to_bool(value)?),
        "tracker.frame_interval_ms" => merge(
            &mut snapshot.tracker.frame_interval_ms,
            to_positive_u64(value)?,
        ),
        "oracle.reporter" => merge(&mut snapshot.oracle.reporter, to_string(value)?),
        "oracle.timeout_ms" => merge(&mut snapshot.oracle.timeout_ms, to_positive_u64(value)?),
        "oracle.command" => merge(&mut snapshot.oracle.command, to_optional_string(value)?),
        "oracle.args" => merge(&mut snapshot.oracle.args, to_string_list(value)?),
        "diagnostics.capacity" => merge(
            &mut snapshot.diagnostics.capacity,
            to_positive_u64(value)? as usize,
        ),
        path => return Err(PolicyError::UnsupportedPath(path.to_string())),
    };
    if changed {
        snapshot.rev = snapshot.rev.saturating_add(1);
        snapshot.set_provenance(path, source);
        debug!(target: "axemode.policy", path, ?source, "policy.override.applied");
    }
    Ok(())
}

fn merge<T: PartialEq>(target: &mut T, candidate: T) -> bool {
    if *target == candidate {
        return false;
    }
    *target = candidate;
    true
}

fn to_u64(value: &Value) -> Result<u64, PolicyError> {
    value
        .as_u64()
        .ok_or_else(|| PolicyError::InvalidValue(format!("expected unsigned integer, got {value}")))
}

fn to_positive_u64(value: &Value) -> Result<u64, PolicyError> {
    match to_u64(value)? {
        0 => Err(PolicyError::InvalidValue("value must be greater than zero".into())),
        v => Ok(v),
    }
}

fn to_bool(value: &Value) -> Result<bool, PolicyError> {
    value
        .as_bool()
        .ok_or_else(|| PolicyError::InvalidValue(format!("expected bool, got {value}")))
}

fn to_string(value: &Value) -> Result<String, PolicyError> {
    value
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| PolicyError::InvalidValue(format!("expected string, got {value}")))
}

fn to_optional_string(value: &Value) -> Result<Option<String>, PolicyError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        other => to_string(other).map(Some),
    }
}

fn to_string_list(value: &Value) -> Result<Vec<String>, PolicyError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items.iter().map(to_string).collect(),
        Value::String(raw) => Ok(raw.split_whitespace().map(str::to_string).collect()),
        other => Err(PolicyError::InvalidValue(format!(
            "expected list of strings, got {other}"
        ))),
    }
}
