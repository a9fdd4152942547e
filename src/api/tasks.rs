//! Task API endpoints.
//!
//! - `GET /api/task?page=<n>&column=<key>` - One page of one or all columns
//! - `POST /api/task` - Create a task at the end of its column
//! - `PUT /api/task` - Update one task (position is a target index)
//! - `DELETE /api/task?taskId=<id>` - Delete one task
//! - `PATCH /api/task/batch` - Apply coalesced reorder updates

use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use std::sync::Arc;

use super::auth::AuthUser;
use super::routes::AppState;
use super::types::*;
use crate::service::ServiceError;

/// Create task routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/",
            get(list_tasks)
                .post(create_task)
                .put(update_task)
                .delete(delete_task),
        )
        .route("/batch", patch(batch_update_tasks))
}

type ApiFailure = (StatusCode, Json<ErrorResponse>);

fn failure(err: ServiceError) -> ApiFailure {
    let status = match &err {
        ServiceError::Validation { .. } => StatusCode::BAD_REQUEST,
        ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Store(e) => {
            tracing::error!("Task store error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let body = match err {
        ServiceError::Validation { message, errors } => ErrorResponse { message, errors },
        ServiceError::Store(_) => ErrorResponse {
            message: "Internal server error".to_string(),
            errors: Vec::new(),
        },
        other => ErrorResponse {
            message: other.to_string(),
            errors: Vec::new(),
        },
    };
    (status, Json(body))
}

/// GET /api/task
async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<TasksQuery>,
) -> Result<Json<TasksResponse>, ApiFailure> {
    state
        .service
        .list(&user.id, &query)
        .await
        .map(Json)
        .map_err(failure)
}

/// POST /api/task
async fn create_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskResponse>), ApiFailure> {
    let task = state.service.create(&user.id, req).await.map_err(failure)?;
    Ok((
        StatusCode::CREATED,
        Json(TaskResponse {
            message: "Task created successfully".to_string(),
            task,
        }),
    ))
}

/// PUT /api/task
async fn update_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<TaskResponse>, ApiFailure> {
    let task = state.service.update(&user.id, req).await.map_err(failure)?;
    Ok(Json(TaskResponse {
        message: "Task updated successfully".to_string(),
        task,
    }))
}

/// DELETE /api/task
async fn delete_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<DeleteTaskQuery>,
) -> Result<Json<MessageResponse>, ApiFailure> {
    state
        .service
        .delete(&user.id, query.task_id.as_deref())
        .await
        .map_err(failure)?;
    Ok(Json(MessageResponse {
        message: "Task deleted successfully".to_string(),
    }))
}

/// PATCH /api/task/batch
async fn batch_update_tasks(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<BatchUpdateRequest>,
) -> Result<Json<BatchUpdateResponse>, ApiFailure> {
    state
        .service
        .apply_batch(&user.id, req)
        .await
        .map(Json)
        .map_err(failure)
}
