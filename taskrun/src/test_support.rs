//! Test-only helpers: task builders, a scripted runner and a failing store.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Result, anyhow};
use chrono::{TimeDelta, TimeZone, Utc};

use crate::core::types::{RunResult, Task, TaskExecution};
use crate::io::process::{CommandRunner, RunError};
use crate::io::store::TaskStore;

/// Create a deterministic task whose command is `date`.
pub fn task(id: &str, name: &str) -> Task {
    Task::new(id, name, "owner", "date")
}

/// Create a task named `<id> task` with an explicit command.
pub fn task_with_command(id: &str, command: &str) -> Task {
    Task::new(id, format!("{id} task"), "owner", command)
}

/// Create a run result with fixed timestamps 5ms apart.
pub fn run_result(exit_code: i32, output: &str) -> RunResult {
    let start_time = Utc
        .with_ymd_and_hms(2024, 1, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp");
    RunResult {
        exit_code,
        output: output.to_string(),
        start_time,
        end_time: start_time + TimeDelta::milliseconds(5),
        duration: Duration::from_millis(5),
    }
}

/// Create a successful execution record with `output`.
pub fn execution(output: &str) -> TaskExecution {
    TaskExecution::from_run(&run_result(0, output))
}

/// Runner that replays queued results in order and records every command.
///
/// Running past the end of the queue yields a `RunError::Output`.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    queue: Mutex<VecDeque<Result<RunResult, RunError>>>,
    commands: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new(results: Vec<Result<RunResult, RunError>>) -> Self {
        Self {
            queue: Mutex::new(results.into()),
            commands: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.commands.lock().expect("commands lock").len()
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().expect("commands lock").clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, command: &str) -> Result<RunResult, RunError> {
        self.commands
            .lock()
            .expect("commands lock")
            .push(command.to_string());
        self.queue
            .lock()
            .expect("queue lock")
            .pop_front()
            .unwrap_or_else(|| Err(RunError::Output("scripted runner exhausted".to_string())))
    }
}

/// Store that serves one task but fails every write.
#[derive(Debug)]
pub struct FailingStore {
    task: Task,
}

impl FailingStore {
    pub fn new(task: Task) -> Self {
        Self { task }
    }
}

impl TaskStore for FailingStore {
    fn find_by_id(&self, id: &str) -> Result<Option<Task>> {
        Ok((id == self.task.id).then(|| self.task.clone()))
    }
    fn save(&self, _task: Task) -> Result<Task> {
        Err(anyhow!("store is read-only"))
    }
    fn save_definition(&self, _task: Task) -> Result<Task> {
        Err(anyhow!("store is read-only"))
    }
    fn append_execution(&self, _id: &str, _execution: TaskExecution) -> Result<Option<Task>> {
        Err(anyhow!("store is read-only"))
    }
    fn exists_by_id(&self, id: &str) -> Result<bool> {
        Ok(id == self.task.id)
    }
    fn find_all(&self) -> Result<Vec<Task>> {
        Ok(vec![self.task.clone()])
    }
    fn find_by_name_containing(&self, _query: &str) -> Result<Vec<Task>> {
        Ok(vec![self.task.clone()])
    }
    fn delete_by_id(&self, _id: &str) -> Result<()> {
        Err(anyhow!("store is read-only"))
    }
}
