use std::time::Duration;

/// Options handed to the audit engine on every run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditOptions {
    /// Report-formatting version; pinned so the violation schema stays stable.
    pub reporter: String,
    pub timeout: Duration,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            reporter: "v2".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}
