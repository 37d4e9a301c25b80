use std::path::{Path, PathBuf};

use async_trait::async_trait;
use axemode_core_types::{SubtreeRef, Violation};
use tracing::debug;

use crate::api::AuditOracle;
use crate::errors::OracleError;
use crate::model::AuditOptions;
use crate::normalize::normalize_report_str;

/// Reads a results document written by an out-of-process audit run.
///
/// The file is re-read on every audit so a watcher writing fresh results is picked up.
pub struct ReportFileOracle {
    path: PathBuf,
}

impl ReportFileOracle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditOracle for ReportFileOracle {
    async fn run_audit(
        &self,
        root: &SubtreeRef,
        options: &AuditOptions,
    ) -> Result<Vec<Violation>, OracleError> {
        let read = tokio::fs::read_to_string(&self.path);
        let raw = tokio::time::timeout(options.timeout, read)
            .await
            .map_err(|_| OracleError::Timeout(options.timeout.as_millis() as u64))?
            .map_err(|err| OracleError::Io(format!("{}: {err}", self.path.display())))?;
        let violations = normalize_report_str(&raw)?;
        debug!(
            target: "axemode.oracle",
            %root,
            path = %self.path.display(),
            violations = violations.len(),
            "oracle.report.loaded"
        );
        Ok(violations)
    }
}
