use std::process::Stdio;

use async_trait::async_trait;
use axemode_core_types::{SubtreeRef, Violation};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::api::AuditOracle;
use crate::errors::OracleError;
use crate::model::AuditOptions;
use crate::normalize::normalize_report_str;

const SUBTREE_PLACEHOLDER: &str = "{subtree}";
const REPORTER_PLACEHOLDER: &str = "{reporter}";

/// Runs an external audit command and parses the results document from its stdout.
///
/// `{subtree}` and `{reporter}` placeholders in the arguments are substituted per run.
pub struct CommandOracle {
    program: String,
    args: Vec<String>,
}

impl CommandOracle {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn expand_args(&self, root: &SubtreeRef, options: &AuditOptions) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                arg.replace(SUBTREE_PLACEHOLDER, &root.0)
                    .replace(REPORTER_PLACEHOLDER, &options.reporter)
            })
            .collect()
    }
}

#[async_trait]
impl AuditOracle for CommandOracle {
    async fn run_audit(
        &self,
        root: &SubtreeRef,
        options: &AuditOptions,
    ) -> Result<Vec<Violation>, OracleError> {
        let args = self.expand_args(root, options);
        debug!(target: "axemode.oracle", program = %self.program, ?args, "oracle.command.spawn");

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| OracleError::Io(format!("spawn {}: {err}", self.program)))?;

        let output = tokio::time::timeout(options.timeout, child.wait_with_output())
            .await
            .map_err(|_| OracleError::Timeout(options.timeout.as_millis() as u64))?
            .map_err(|err| OracleError::Io(err.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(target: "axemode.oracle", status = ?output.status.code(), "oracle.command.failed");
            return Err(OracleError::engine(if stderr.is_empty() {
                format!("{} exited with {}", self.program, output.status)
            } else {
                stderr
            }));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        normalize_report_str(&stdout)
    }
}
