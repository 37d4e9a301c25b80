use axemode_core_types::Violation;
use serde_json::Value;
use tracing::warn;

use crate::errors::OracleError;

/// Accepts a full results document (`{"violations": [...]}`) or a bare violation array.
pub fn normalize_report(report: Value) -> Result<Vec<Violation>, OracleError> {
    let items = match report {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("violations") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => {
                return Err(OracleError::Malformed(
                    "results object has no `violations` list".into(),
                ))
            }
            Some(other) => {
                return Err(OracleError::Malformed(format!(
                    "`violations` must be a list, got {}",
                    kind_of(&other)
                )))
            }
        },
        other => {
            return Err(OracleError::Malformed(format!(
                "expected results object or violation list, got {}",
                kind_of(&other)
            )))
        }
    };
    let total = items.len();
    let mut violations = Vec::with_capacity(total);
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<Violation>(item) {
            Ok(violation) => violations.push(violation),
            Err(err) => warn!(
                target: "axemode.oracle",
                index,
                total,
                error = %err,
                "report.violation.skipped"
            ),
        }
    }
    Ok(violations)
}

pub fn normalize_report_str(raw: &str) -> Result<Vec<Violation>, OracleError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|err| OracleError::Malformed(err.to_string()))?;
    normalize_report(value)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
