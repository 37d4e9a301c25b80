use axemode_core_types::{AxeModeError, TargetSelector};
use axemode_scheduler::SchedulerError;
use thiserror::Error;

/// A target selector did not resolve to a live element.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("no element matches {0}")]
    NotFound(TargetSelector),
    #[error("element for {0} is detached from the watched subtree")]
    Detached(TargetSelector),
    #[error("invalid selector: {0}")]
    InvalidSelector(String),
}

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("target not tracked in the current cycle: {0}")]
    UnknownTarget(TargetSelector),
    #[error("invalid shortcut: {0}")]
    InvalidShortcut(String),
    #[error("overlay is not mounted")]
    NotMounted,
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

impl From<OverlayError> for AxeModeError {
    fn from(value: OverlayError) -> Self {
        AxeModeError::new(value.to_string())
    }
}

impl From<LookupError> for AxeModeError {
    fn from(value: LookupError) -> Self {
        AxeModeError::new(value.to_string())
    }
}
