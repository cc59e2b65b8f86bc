//! Stable exit codes for taskrun CLI commands.

use crate::error::TaskError;

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid config, store failure, bad arguments or any other error.
pub const INVALID: i32 = 1;
/// Command or task definition refused by policy.
pub const REJECTED: i32 = 2;
/// Referenced task does not exist, or a search matched nothing.
pub const NOT_FOUND: i32 = 3;
/// The command could not be spawned or waited on.
pub const EXECUTION_FAILED: i32 = 4;

/// Exit code for an error returned by a CLI command.
pub fn for_error(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<TaskError>() {
        Some(TaskError::Rejected(_)) => REJECTED,
        Some(TaskError::NotFound(_)) => NOT_FOUND,
        Some(TaskError::ExecutionFailed(_)) => EXECUTION_FAILED,
        Some(TaskError::Store(_)) | None => INVALID,
    }
}
