//! Fixture loading for the command line: audit reports, page layouts and scripts.

use std::path::Path;

use axemode_audit_oracle::normalize_report_str;
use axemode_core_types::Violation;
use serde::de::DeserializeOwned;

use crate::errors::SessionError;

pub fn read_report(path: &Path) -> Result<Vec<Violation>, SessionError> {
    let raw = read_to_string(path)?;
    normalize_report_str(&raw).map_err(|err| SessionError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

/// Reads a YAML (or JSON) document into `T`.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T, SessionError> {
    let raw = read_to_string(path)?;
    serde_yaml::from_str(&raw).map_err(|err| SessionError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

fn read_to_string(path: &Path) -> Result<String, SessionError> {
    std::fs::read_to_string(path).map_err(|source| SessionError::Io {
        path: path.to_path_buf(),
        source,
    })
}
