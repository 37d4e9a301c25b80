//! Errors raised while loading fixtures and driving scripted sessions.

use std::path::PathBuf;

use axemode_audit_oracle::OracleError;
use axemode_core_types::AxeModeError;
use axemode_overlay::OverlayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("step {index}: {message}")]
    Step { index: usize, message: String },
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error(transparent)]
    Overlay(#[from] OverlayError),
}

impl SessionError {
    pub fn step(index: usize, message: impl Into<String>) -> Self {
        SessionError::Step {
            index,
            message: message.into(),
        }
    }
}

impl From<SessionError> for AxeModeError {
    fn from(value: SessionError) -> Self {
        AxeModeError::new(value.to_string())
    }
}
