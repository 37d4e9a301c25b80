//! axe-mode: live accessibility overlay.
//!
//! The engine lives in the workspace crates; this crate adds an in-memory host, scripted
//! sessions and fixture loading used by the `axe-mode` binary and integration tests.

pub mod errors;
pub mod host;
pub mod report;
pub mod script;

pub use errors::SessionError;
pub use host::{ElementSpec, InMemoryHost, MarkerView, PageFixture};
pub use script::{Script, Session, Step, StepRecord};

pub use axemode_audit_oracle as oracle;
pub use axemode_core_types as types;
pub use axemode_overlay as overlay;
pub use axemode_policy_center as policy;
pub use axemode_scheduler as scheduler;
pub use axemode_state_center as state;
