use axemode_core_types::AxeModeError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("scheduler torn down")]
    TornDown,
    #[error("no async runtime available for idle execution")]
    NoRuntime,
}

impl From<SchedulerError> for AxeModeError {
    fn from(value: SchedulerError) -> Self {
        AxeModeError::new(format!("scheduler error: {value}"))
    }
}
