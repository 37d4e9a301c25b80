use std::collections::VecDeque;

use async_trait::async_trait;
use axemode_core_types::{SubtreeRef, Violation};
use parking_lot::Mutex;

use crate::api::AuditOracle;
use crate::errors::OracleError;
use crate::model::AuditOptions;

type Outcome = Result<Vec<Violation>, OracleError>;

/// Oracle answering from a fixed script of outcomes; the last outcome repeats once the
/// script runs dry. Records every subtree it was asked to audit.
pub struct StaticOracle {
    script: Mutex<VecDeque<Outcome>>,
    last: Mutex<Outcome>,
    audited: Mutex<Vec<SubtreeRef>>,
}

impl StaticOracle {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self::scripted(vec![Ok(violations)])
    }

    pub fn scripted(outcomes: Vec<Outcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            last: Mutex::new(Ok(Vec::new())),
            audited: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.audited.lock().len()
    }

    pub fn audited(&self) -> Vec<SubtreeRef> {
        self.audited.lock().clone()
    }
}

#[async_trait]
impl AuditOracle for StaticOracle {
    async fn run_audit(
        &self,
        root: &SubtreeRef,
        _options: &AuditOptions,
    ) -> Result<Vec<Violation>, OracleError> {
        self.audited.lock().push(root.clone());
        let next = self.script.lock().pop_front();
        match next {
            Some(outcome) => {
                *self.last.lock() = outcome.clone();
                outcome
            }
            None => self.last.lock().clone(),
        }
    }
}
