//! Translation of task errors into problem-detail responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use taskrun::error::TaskError;
use tracing::warn;

/// Problem-detail body returned for every failed request.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Problem {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub title: String,
    pub status: u16,
    pub detail: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    title: &'static str,
    detail: String,
}

impl ApiError {
    pub fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            title: "Internal error",
            detail: detail.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn problem(&self) -> Problem {
        Problem {
            kind: "about:blank",
            title: self.title.to_string(),
            status: self.status.as_u16(),
            detail: self.detail.clone(),
        }
    }
}

impl From<TaskError> for ApiError {
    fn from(err: TaskError) -> Self {
        let (status, title) = match &err {
            TaskError::Rejected(_) => (StatusCode::BAD_REQUEST, "Invalid command"),
            TaskError::NotFound(_) => (StatusCode::NOT_FOUND, "Not found"),
            TaskError::ExecutionFailed(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Execution failed")
            }
            TaskError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Task store failure"),
        };
        Self {
            status,
            title,
            detail: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(status = self.status.as_u16(), detail = %self.detail, "request failed");
        }
        (self.status, Json(self.problem())).into_response()
    }
}
