//! Task operations: CRUD over the store plus the execute pipeline.
//!
//! `execute` is the only place validation, subprocess execution and history
//! persistence meet. The service holds no state between calls. Writes that
//! touch history go through the store's atomic operations, so concurrent
//! calls (in one process or several) never drop an execution record.

use tracing::{debug, info, instrument};

use crate::core::types::{Task, TaskExecution};
use crate::core::validator::CommandValidator;
use crate::error::{TaskError, TaskResult};
use crate::io::process::CommandRunner;
use crate::io::store::TaskStore;

/// Composes a store, a validator and a runner.
pub struct TaskService<S, R> {
    store: S,
    validator: CommandValidator,
    runner: R,
}

impl<S: TaskStore, R: CommandRunner> TaskService<S, R> {
    pub fn new(store: S, validator: CommandValidator, runner: R) -> Self {
        Self {
            store,
            validator,
            runner,
        }
    }

    pub fn find_all(&self) -> TaskResult<Vec<Task>> {
        self.store.find_all().map_err(TaskError::Store)
    }

    pub fn get_by_id(&self, id: &str) -> TaskResult<Task> {
        self.store
            .find_by_id(id)
            .map_err(TaskError::Store)?
            .ok_or_else(|| TaskError::task_not_found(id))
    }

    /// Case-insensitive name search. No match is `NotFound`.
    pub fn search_by_name(&self, query: &str) -> TaskResult<Vec<Task>> {
        let tasks = self
            .store
            .find_by_name_containing(query)
            .map_err(TaskError::Store)?;
        if tasks.is_empty() {
            return Err(TaskError::NotFound(format!("no tasks match: {query}")));
        }
        Ok(tasks)
    }

    /// Validate and save a task definition.
    ///
    /// History is owned by the store: an existing task keeps its recorded
    /// executions and a new task starts empty, whatever `task` carries.
    #[instrument(skip_all, fields(task_id = %task.id))]
    pub fn upsert(&self, task: Task) -> TaskResult<Task> {
        require_non_blank("id", &task.id)?;
        require_non_blank("name", &task.name)?;
        require_non_blank("owner", &task.owner)?;
        self.check(&task.command)?;

        let saved = self.store.save_definition(task).map_err(TaskError::Store)?;
        debug!("task saved");
        Ok(saved)
    }

    pub fn delete(&self, id: &str) -> TaskResult<()> {
        if !self.store.exists_by_id(id).map_err(TaskError::Store)? {
            return Err(TaskError::task_not_found(id));
        }
        self.store.delete_by_id(id).map_err(TaskError::Store)?;
        debug!(task_id = id, "task deleted");
        Ok(())
    }

    /// Run a task (or a one-off override) and record the execution.
    ///
    /// A blank override falls back to the stored command. The effective
    /// command is always validated. Runner failures append nothing. A task
    /// deleted while its command runs is `NotFound` and nothing is recorded.
    #[instrument(skip_all, fields(task_id = id, has_override = override_command.is_some()))]
    pub fn execute(&self, id: &str, override_command: Option<&str>) -> TaskResult<TaskExecution> {
        let task = self.get_by_id(id)?;
        let command = effective_command(&task, override_command);
        self.check(command)?;

        let result = self
            .runner
            .run(command)
            .map_err(|err| TaskError::ExecutionFailed(err.to_string()))?;
        let execution = TaskExecution::from_run(&result);

        self.store
            .append_execution(id, execution.clone())
            .map_err(TaskError::Store)?
            .ok_or_else(|| TaskError::task_not_found(id))?;
        info!(
            exit_code = result.exit_code,
            duration_ms = result.duration.as_millis() as u64,
            "execution recorded"
        );
        Ok(execution)
    }

    fn check(&self, command: &str) -> TaskResult<()> {
        self.validator
            .validate(command)
            .into_result()
            .map_err(TaskError::Rejected)
    }
}

/// Override when present and non-blank, else the stored command.
fn effective_command<'a>(task: &'a Task, override_command: Option<&'a str>) -> &'a str {
    match override_command {
        Some(cmd) if !cmd.trim().is_empty() => cmd,
        _ => &task.command,
    }
}

fn require_non_blank(field: &str, value: &str) -> TaskResult<()> {
    if value.trim().is_empty() {
        return Err(TaskError::Rejected(format!("{field} must not be blank")));
    }
    Ok(())
}
