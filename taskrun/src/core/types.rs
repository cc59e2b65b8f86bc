//! Task domain types shared by the core, the store and the boundaries.
//!
//! These types carry no I/O. Serialized field names are camelCase to keep the
//! wire format stable for existing clients.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named shell command template plus its execution history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub command: String,
    /// Chronological, append-only.
    #[serde(default)]
    pub task_executions: Vec<TaskExecution>,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        owner: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            owner: owner.into(),
            command: command.into(),
            task_executions: Vec::new(),
        }
    }

    /// Consume the task and return it with `execution` appended to its history.
    pub fn with_execution(mut self, execution: TaskExecution) -> Self {
        self.task_executions.push(execution);
        self
    }

    /// Consume the task and return it carrying `history` instead of its own.
    pub fn with_history(mut self, history: Vec<TaskExecution>) -> Self {
        self.task_executions = history;
        self
    }
}

/// Immutable record of one completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskExecution {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub output: String,
}

impl TaskExecution {
    /// Build the history record for a finished run.
    ///
    /// Non-zero exits are annotated with `(exit=<code>)` after the output.
    pub fn from_run(result: &RunResult) -> Self {
        let mut output = result.output.clone();
        if result.exit_code != 0 {
            output.push_str(&format!("(exit={})", result.exit_code));
        }
        Self {
            start_time: result.start_time,
            end_time: result.end_time,
            output,
        }
    }
}

/// Raw outcome of a subprocess run. A non-zero `exit_code` is still a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub exit_code: i32,
    /// stdout and stderr interleaved, lines joined by the host separator.
    pub output: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::run_result;

    #[test]
    fn zero_exit_is_not_annotated() {
        let exec = TaskExecution::from_run(&run_result(0, "hi\n"));
        assert_eq!(exec.output, "hi\n");
    }

    #[test]
    fn non_zero_exit_is_annotated() {
        let exec = TaskExecution::from_run(&run_result(2, "boom\n"));
        assert_eq!(exec.output, "boom\n(exit=2)");
    }

    #[test]
    fn with_execution_appends_in_order() {
        let first = TaskExecution::from_run(&run_result(0, "1\n"));
        let second = TaskExecution::from_run(&run_result(0, "2\n"));
        let task = Task::new("t1", "n", "o", "echo")
            .with_execution(first.clone())
            .with_execution(second.clone());
        assert_eq!(task.task_executions, vec![first, second]);
    }

    #[test]
    fn serializes_camel_case() {
        let task = Task::new("t1", "name", "owner", "echo hi");
        let value = serde_json::to_value(&task).expect("serialize");
        assert_eq!(value["taskExecutions"], serde_json::json!([]));
        assert!(value.get("task_executions").is_none());
    }

    #[test]
    fn missing_history_defaults_to_empty() {
        let task: Task = serde_json::from_str(
            r#"{"id":"1","name":"n","owner":"o","command":"date"}"#,
        )
        .expect("parse");
        assert!(task.task_executions.is_empty());
    }
}
