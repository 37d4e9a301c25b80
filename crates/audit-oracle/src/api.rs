use async_trait::async_trait;
use axemode_core_types::{SubtreeRef, Violation};

use crate::errors::OracleError;
use crate::model::AuditOptions;

/// External accessibility audit engine.
///
/// Implementations must not mutate the audited subtree and are not retried on failure.
#[async_trait]
pub trait AuditOracle: Send + Sync {
    async fn run_audit(
        &self,
        root: &SubtreeRef,
        options: &AuditOptions,
    ) -> Result<Vec<Violation>, OracleError>;
}
