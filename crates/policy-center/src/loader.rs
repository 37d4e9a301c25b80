use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::api::apply_override;
use crate::defaults::default_snapshot;
use crate::errors::PolicyError;
use crate::model::{PolicySnapshot, PolicySource};

const ENV_PREFIX: &str = "AXE_MODE__";
const ENV_JSON: &str = "AXE_MODE_OVERRIDE_JSON";

#[derive(Debug, Default)]
pub struct LoadOptions {
    pub paths: Vec<PathBuf>,
    pub include_env: bool,
    /// `path=value` pairs, applied last.
    pub cli_overrides: Vec<String>,
}

impl LoadOptions {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            paths: vec![path.into()],
            include_env: true,
            cli_overrides: Vec::new(),
        }
    }
}

pub fn load_snapshot(path: Option<&Path>) -> Result<PolicySnapshot, PolicyError> {
    let mut options = LoadOptions {
        include_env: true,
        ..LoadOptions::default()
    };
    if let Some(p) = path {
        options.paths.push(p.to_path_buf());
    }
    load_snapshot_with_options(&options)
}

pub fn load_snapshot_with_options(options: &LoadOptions) -> Result<PolicySnapshot, PolicyError> {
    let mut snapshot = default_snapshot();
    bootstrap_builtin_provenance(&mut snapshot)?;

    for path in &options.paths {
        if !path.exists() {
            return Err(PolicyError::Io(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let overlays = overlays_from_file(path)?;
        apply_overlays(&mut snapshot, overlays)?;
    }

    if options.include_env {
        let env_overlays = overlays_from_env()?;
        apply_overlays(&mut snapshot, env_overlays)?;
    }

    let cli_overlays = overlays_from_cli(&options.cli_overrides)?;
    apply_overlays(&mut snapshot, cli_overlays)?;

    Ok(snapshot)
}

struct PolicyOverlay {
    path: String,
    value: Value,
    source: PolicySource,
}

fn apply_overlays(
    snapshot: &mut PolicySnapshot,
    overlays: Vec<PolicyOverlay>,
) -> Result<(), PolicyError> {
    for overlay in overlays {
        apply_override(snapshot, &overlay.path, &overlay.value, overlay.source)?;
    }
    Ok(())
}

fn overlays_from_file(path: &Path) -> Result<Vec<PolicyOverlay>, PolicyError> {
    let content = fs::read_to_string(path).map_err(|err| PolicyError::Io(format!("{}", err)))?;
    // YAML is a superset of JSON, so one parser covers both file flavours.
    let yaml_value: serde_yaml::Value =
        serde_yaml::from_str(&content).map_err(|err| PolicyError::Invalid(format!("{}", err)))?;
    let json_value =
        serde_json::to_value(yaml_value).map_err(|err| PolicyError::Invalid(format!("{}", err)))?;
    Ok(flatten_value(json_value, None, PolicySource::File))
}

fn overlays_from_env() -> Result<Vec<PolicyOverlay>, PolicyError> {
    let mut overlays = Vec::new();
    let mut vars: Vec<(String, String)> = env::vars().collect();
    vars.sort();
    for (key, raw) in vars {
        if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
            let path = stripped
                .split("__")
                .filter(|segment| !segment.is_empty())
                .map(|segment| segment.to_ascii_lowercase())
                .collect::<Vec<_>>()
                .join(".");
            if path.is_empty() {
                continue;
            }
            overlays.push(PolicyOverlay {
                path,
                value: parse_raw_value(&raw),
                source: PolicySource::Env,
            });
        }
    }

    if let Ok(raw_json) = env::var(ENV_JSON) {
        if !raw_json.trim().is_empty() {
            let json_value: Value = serde_json::from_str(&raw_json)
                .map_err(|err| PolicyError::Invalid(format!("{}", err)))?;
            overlays.extend(flatten_value(json_value, None, PolicySource::Env));
        }
    }

    Ok(overlays)
}

fn overlays_from_cli(pairs: &[String]) -> Result<Vec<PolicyOverlay>, PolicyError> {
    let mut overlays = Vec::new();
    for token in pairs {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            continue;
        }
        let (path, value_raw) = trimmed.split_once('=').ok_or_else(|| {
            PolicyError::Invalid(format!("override `{trimmed}` is not of the form path=value"))
        })?;
        let path = path.trim();
        if path.is_empty() {
            return Err(PolicyError::Invalid(format!(
                "override `{trimmed}` has an empty path"
            )));
        }
        overlays.push(PolicyOverlay {
            path: path.to_string(),
            value: parse_raw_value(value_raw.trim()),
            source: PolicySource::Cli,
        });
    }
    Ok(overlays)
}

fn parse_raw_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
        return parsed;
    }
    Value::String(raw.to_string())
}

fn flatten_value(value: Value, prefix: Option<String>, source: PolicySource) -> Vec<PolicyOverlay> {
    match value {
        Value::Object(map) => {
            let mut result = Vec::new();
            for (key, value) in map {
                let key_segment = key.trim().to_ascii_lowercase();
                let next_prefix = match &prefix {
                    Some(prefix) if !prefix.is_empty() => format!("{}.{}", prefix, key_segment),
                    _ => key_segment,
                };
                result.extend(flatten_value(value, Some(next_prefix), source));
            }
            result
        }
        other => match prefix {
            Some(path) => vec![PolicyOverlay {
                path,
                value: other,
                source,
            }],
            None => Vec::new(),
        },
    }
}

fn bootstrap_builtin_provenance(snapshot: &mut PolicySnapshot) -> Result<(), PolicyError> {
    let sections = [
        ("activation", serde_json::to_value(&snapshot.activation)),
        ("scheduler", serde_json::to_value(&snapshot.scheduler)),
        ("tracker", serde_json::to_value(&snapshot.tracker)),
        ("oracle", serde_json::to_value(&snapshot.oracle)),
        ("diagnostics", serde_json::to_value(&snapshot.diagnostics)),
    ];
    let mut overlays = Vec::new();
    for (name, value) in sections {
        let value = value.map_err(|err| PolicyError::Invalid(format!("{}", err)))?;
        overlays.extend(flatten_value(value, Some(name.into()), PolicySource::Builtin));
    }
    for overlay in overlays {
        snapshot.set_provenance(&overlay.path, overlay.source);
    }
    Ok(())
}
