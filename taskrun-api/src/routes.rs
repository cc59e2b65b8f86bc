//! HTTP route handlers for the task API.

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, put};
use serde::Deserialize;
use taskrun::core::types::{Task, TaskExecution};
use taskrun::error::TaskResult;

use crate::error::ApiError;
use crate::state::{AppState, Service};

/// Build the API router.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/tasks", get(list_tasks).put(upsert_task))
        .route("/tasks/search", get(search_tasks))
        .route("/tasks/{id}", get(get_task).delete(delete_task))
        .route("/tasks/{id}/execute", put(execute_task))
}

async fn health() -> &'static str {
    "ok"
}

/// Run a service call off the async runtime; store and runner calls block.
async fn blocking<T, F>(state: &AppState, call: F) -> Result<T, ApiError>
where
    F: FnOnce(&Service) -> TaskResult<T> + Send + 'static,
    T: Send + 'static,
{
    let service = Arc::clone(&state.service);
    tokio::task::spawn_blocking(move || call(&service))
        .await
        .map_err(|err| ApiError::internal(format!("blocking task failed: {err}")))?
        .map_err(ApiError::from)
}

/// GET /api/tasks - all tasks.
async fn list_tasks(State(state): State<AppState>) -> Result<Json<Vec<Task>>, ApiError> {
    let tasks = blocking(&state, |svc| svc.find_all()).await?;
    Ok(Json(tasks))
}

/// GET /api/tasks/{id} - one task with its history.
async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    let task = blocking(&state, move |svc| svc.get_by_id(&id)).await?;
    Ok(Json(task))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    q: String,
}

/// GET /api/tasks/search?q= - case-insensitive name search.
async fn search_tasks(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let tasks = blocking(&state, move |svc| svc.search_by_name(&params.q)).await?;
    Ok(Json(tasks))
}

/// PUT /api/tasks - create or replace a task definition.
async fn upsert_task(
    State(state): State<AppState>,
    Json(task): Json<Task>,
) -> Result<Json<Task>, ApiError> {
    let saved = blocking(&state, move |svc| svc.upsert(task)).await?;
    Ok(Json(saved))
}

/// DELETE /api/tasks/{id}.
async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    blocking(&state, move |svc| svc.delete(&id)).await?;
    Ok(StatusCode::OK)
}

/// PUT /api/tasks/{id}/execute - run the task; a non-empty body is a one-off
/// override command.
async fn execute_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<TaskExecution>, ApiError> {
    let override_command =
        (!body.is_empty()).then(|| String::from_utf8_lossy(&body).into_owned());
    let execution = blocking(&state, move |svc| {
        svc.execute(&id, override_command.as_deref())
    })
    .await?;
    Ok(Json(execution))
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskrun::core::validator::CommandValidator;
    use taskrun::io::process::CommandRunner;
    use taskrun::io::store::{MemoryTaskStore, TaskStore};
    use taskrun::service::TaskService;
    use taskrun::test_support::{ScriptedRunner, run_result, task_with_command};

    fn state_with(tasks: Vec<Task>, runner: ScriptedRunner) -> (AppState, Arc<ScriptedRunner>) {
        let runner = Arc::new(runner);
        let store: Arc<dyn TaskStore> = Arc::new(MemoryTaskStore::with_tasks(tasks));
        let shared_runner: Arc<dyn CommandRunner> = runner.clone();
        let service = TaskService::new(store, CommandValidator::default(), shared_runner);
        (AppState::new(service), runner)
    }

    #[tokio::test]
    async fn get_unknown_task_is_404() {
        let (state, _) = state_with(vec![], ScriptedRunner::empty());
        let err = get_task(State(state), Path("nope".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.problem().detail, "task not found: nope");
    }

    #[tokio::test]
    async fn upsert_then_list() {
        let (state, _) = state_with(vec![], ScriptedRunner::empty());
        upsert_task(State(state.clone()), Json(task_with_command("1", "date")))
            .await
            .expect("upsert");
        let Json(tasks) = list_tasks(State(state)).await.expect("list");
        assert_eq!(tasks.len(), 1);
    }

    #[tokio::test]
    async fn upsert_unsafe_command_is_400() {
        let (state, _) = state_with(vec![], ScriptedRunner::empty());
        let err = upsert_task(State(state), Json(task_with_command("1", "ls | cat")))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.problem().title, "Invalid command");
    }

    #[tokio::test]
    async fn search_without_match_is_404() {
        let (state, _) = state_with(vec![task_with_command("1", "date")], ScriptedRunner::empty());
        let params = SearchParams {
            q: "zzz".to_string(),
        };
        let err = search_tasks(State(state), Query(params)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn execute_with_empty_body_runs_stored_command() {
        let (state, runner) = state_with(
            vec![task_with_command("1", "echo hi")],
            ScriptedRunner::new(vec![Ok(run_result(0, "hi\n"))]),
        );
        let Json(execution) = execute_task(State(state), Path("1".to_string()), Bytes::new())
            .await
            .expect("execute");
        assert_eq!(execution.output, "hi\n");
        assert_eq!(runner.commands(), vec!["echo hi".to_string()]);
    }

    #[tokio::test]
    async fn execute_with_denied_override_is_400() {
        let (state, runner) = state_with(
            vec![task_with_command("1", "echo hi")],
            ScriptedRunner::new(vec![Ok(run_result(0, ""))]),
        );
        let err = execute_task(
            State(state),
            Path("1".to_string()),
            Bytes::from_static(b"rm -rf /"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(runner.calls(), 0);
    }

    #[tokio::test]
    async fn delete_then_get_is_404() {
        let (state, _) = state_with(vec![task_with_command("1", "date")], ScriptedRunner::empty());
        let status = delete_task(State(state.clone()), Path("1".to_string()))
            .await
            .expect("delete");
        assert_eq!(status, StatusCode::OK);
        let err = get_task(State(state), Path("1".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
