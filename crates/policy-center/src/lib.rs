pub mod api;
pub mod defaults;
pub mod errors;
pub mod loader;
pub mod model;

pub use api::apply_override;
pub use defaults::default_snapshot;
pub use errors::PolicyError;
pub use loader::{load_snapshot, load_snapshot_with_options, LoadOptions};
pub use model::{
    ActivationPolicy, DiagnosticsPolicy, OraclePolicy, PolicyProvenance, PolicySnapshot,
    PolicySource, SchedulerPolicy, TrackerPolicy,
};
