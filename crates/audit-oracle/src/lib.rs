pub mod api;
pub mod command;
pub mod errors;
pub mod file;
pub mod fixed;
pub mod model;
pub mod normalize;

pub use api::AuditOracle;
pub use command::CommandOracle;
pub use errors::OracleError;
pub use file::ReportFileOracle;
pub use fixed::StaticOracle;
pub use model::AuditOptions;
pub use normalize::{normalize_report, normalize_report_str};
