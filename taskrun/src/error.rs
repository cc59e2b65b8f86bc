//! Typed failures surfaced by [`TaskService`](crate::service::TaskService).
//!
//! Boundaries branch on the variant: the CLI maps it to an exit code, the HTTP
//! server to a status. Nothing in the core recovers from or retries these.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    /// Command or task fields refused by policy. The reason is kept verbatim.
    #[error("{0}")]
    Rejected(String),

    #[error("{0}")]
    NotFound(String),

    /// The subprocess could not be spawned or waited on. Never a non-zero exit.
    #[error("failed to run command: {0}")]
    ExecutionFailed(String),

    #[error("task store failure: {0:#}")]
    Store(anyhow::Error),
}

impl TaskError {
    pub fn task_not_found(id: &str) -> Self {
        TaskError::NotFound(format!("task not found: {id}"))
    }
}

pub type TaskResult<T> = std::result::Result<T, TaskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_reason_is_displayed_verbatim() {
        let err = TaskError::Rejected("command must not be blank".to_string());
        assert_eq!(err.to_string(), "command must not be blank");
    }

    #[test]
    fn store_error_keeps_context_chain() {
        let inner = anyhow::anyhow!("disk full").context("write tasks.json");
        let err = TaskError::Store(inner);
        assert_eq!(err.to_string(), "task store failure: write tasks.json: disk full");
    }
}
