use thiserror::Error;

/// Run-level failures that abort an entire report run.
///
/// Per-job network failures never surface here — they are captured in
/// each job's fetch outcome and degrade to empty output fields.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("no valid validation-task identifiers supplied")]
    NoValidTasks,

    #[error("no valid {expected} identifiers supplied")]
    NoValidInput { expected: &'static str },

    #[error("discovery failed for task {task}: {reason}")]
    Discovery { task: String, reason: String },

    #[error("accumulation failed for target {target}: {reason}")]
    Accumulation { target: String, reason: String },

    #[error("{0}")]
    Other(String),
}
