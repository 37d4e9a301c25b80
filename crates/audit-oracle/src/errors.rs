use axemode_core_types::AxeModeError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("audit engine failed: {0}")]
    Engine(String),
    #[error("malformed audit report: {0}")]
    Malformed(String),
    #[error("audit timed out after {0}ms")]
    Timeout(u64),
    #[error("io error: {0}")]
    Io(String),
}

impl OracleError {
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }
}

impl From<OracleError> for AxeModeError {
    fn from(value: OracleError) -> Self {
        AxeModeError::new(value.to_string())
    }
}
