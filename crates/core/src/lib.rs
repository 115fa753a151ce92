pub mod config;
pub mod error;
pub mod ids;
pub mod report;
pub mod time;

pub use config::Config;
pub use error::AuditError;
pub use ids::*;
pub use report::Report;
