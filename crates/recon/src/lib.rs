pub mod lookups;
pub mod model;
pub mod pipeline;
pub mod route_cache;

pub use model::{AuditRow, AuditTarget, DefectKind, ParcelRow};
pub use pipeline::{AuditPipeline, MAX_TASKS};
pub use route_cache::RouteCache;
