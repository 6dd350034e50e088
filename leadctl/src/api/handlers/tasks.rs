//! Tasks assigned inside a profile, optionally with a brief attached.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use sqlx::PgConnection;

use super::uploads::UploadForm;
use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        tasks::{ListTasksQuery, TaskCreate, TaskResponse, TaskUpdate},
        users::CurrentUser,
    },
    auth::permissions::{RequiresPermission, ensure_profile_access, operation, require_profile_filter, resource},
    db::{
        handlers::{
            Repository, Tasks,
            attachments::{self, UploadOwner},
            tasks::TaskFilter,
        },
        models::tasks::{TaskCreateDBRequest, TaskDBResponse, TaskUpdateDBRequest},
    },
    errors::{Error, Result},
    storage::UploadArea,
    types::TaskId,
};

pub(crate) async fn accessible_task(conn: &mut PgConnection, user: &CurrentUser, id: TaskId) -> Result<TaskDBResponse> {
    let task = Tasks::new(&mut *conn).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Task".to_string(),
        id: id.to_string(),
    })?;
    ensure_profile_access(conn, user, task.profile_id).await?;
    Ok(task)
}

#[utoipa::path(
    get,
    path = "/tasks",
    tag = "tasks",
    summary = "List tasks",
    params(ListTasksQuery),
    responses((status = 200, description = "Page of tasks", body = PaginatedResponse<TaskResponse>)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<ListTasksQuery>,
    current_user: RequiresPermission<resource::Tasks, operation::ReadOwn>,
) -> Result<Json<PaginatedResponse<TaskResponse>>> {
    let profile_id = require_profile_filter(&current_user, query.profile_id)?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if let Some(profile_id) = profile_id {
        ensure_profile_access(&mut conn, &current_user, profile_id).await?;
    }

    let filter = TaskFilter {
        profile_id,
        status: query.status,
        offset: query.pagination.offset(),
        limit: query.pagination.limit(),
    };
    let mut repo = Tasks::new(&mut conn);
    let tasks = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;
    Ok(Json(PaginatedResponse::new(
        tasks.into_iter().map(TaskResponse::from).collect(),
        total,
        &query.pagination,
    )))
}

async fn insert_task(state: &AppState, user: &CurrentUser, form: &UploadForm) -> Result<TaskDBResponse> {
    let create: TaskCreate = form.parse()?;
    if create.title.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "title is required".to_string(),
        });
    }
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    ensure_profile_access(&mut conn, user, create.profile_id).await?;
    let task = Tasks::new(&mut conn)
        .create(&TaskCreateDBRequest {
            profile_id: create.profile_id,
            title: create.title,
            description: create.description,
            due_date: create.due_date,
            document_path: form.document_path(),
        })
        .await?;
    Ok(task)
}

#[utoipa::path(
    post,
    path = "/tasks",
    tag = "tasks",
    summary = "Create task",
    description = "Multipart form with the task fields and an optional `file`.",
    request_body(content = TaskCreate, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Task created", body = TaskResponse),
        (status = 409, description = "Title already used in this profile"),
        (status = 413, description = "File too large"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_task(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Tasks, operation::CreateOwn>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<TaskResponse>)> {
    let mut form = UploadForm::read(&state.uploads, UploadArea::Tasks, multipart).await?;
    let result = insert_task(&state, &current_user, &form).await;
    let task = form.settle(&state.uploads, result)?;
    Ok((StatusCode::CREATED, Json(TaskResponse::from(task))))
}

#[utoipa::path(
    get,
    path = "/tasks/{id}",
    tag = "tasks",
    summary = "Get task",
    params(("id" = String, Path, format = "uuid", description = "Task ID")),
    responses(
        (status = 200, description = "Task", body = TaskResponse),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
    current_user: RequiresPermission<resource::Tasks, operation::ReadOwn>,
) -> Result<Json<TaskResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let task = accessible_task(&mut conn, &current_user, id).await?;
    Ok(Json(TaskResponse::from(task)))
}

#[utoipa::path(
    patch,
    path = "/tasks/{id}",
    tag = "tasks",
    summary = "Update task",
    params(("id" = String, Path, format = "uuid", description = "Task ID")),
    request_body = TaskUpdate,
    responses(
        (status = 200, description = "Updated task", body = TaskResponse),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
    current_user: RequiresPermission<resource::Tasks, operation::UpdateOwn>,
    Json(update): Json<TaskUpdate>,
) -> Result<Json<TaskResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    accessible_task(&mut conn, &current_user, id).await?;
    let task = Tasks::new(&mut conn)
        .update(
            id,
            &TaskUpdateDBRequest {
                title: update.title,
                description: update.description,
                status: update.status,
                due_date: update.due_date,
            },
        )
        .await?;
    Ok(Json(TaskResponse::from(task)))
}

#[utoipa::path(
    delete,
    path = "/tasks/{id}",
    tag = "tasks",
    summary = "Delete task",
    description = "Also deletes the task's submissions. Attached files are removed in the background.",
    params(("id" = String, Path, format = "uuid", description = "Task ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
    current_user: RequiresPermission<resource::Tasks, operation::DeleteOwn>,
) -> Result<StatusCode> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    accessible_task(&mut tx, &current_user, id).await?;
    let orphaned = attachments::orphaned_by(&mut tx, UploadOwner::Task(id)).await?;
    Tasks::new(&mut tx).delete(id).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    state.uploads.remove_all_in_background(orphaned);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(all(test, feature = "live-db-tests"))]
mod tests {
    use crate::api::models::tasks::TaskResponse;
    use crate::db::models::tasks::TaskStatus;
    use crate::test_utils::{bearer, create_test_app, create_test_profile, profile_owner};
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_task_with_brief(pool: PgPool) {
        let (server, _bg, dir) = create_test_app(pool.clone()).await;
        let profile = create_test_profile(&pool).await;
        let owner = profile_owner(&pool, &profile).await;

        let form = MultipartForm::new()
            .add_text("profileId", profile.id.to_string())
            .add_text("title", "Call the Q3 list")
            .add_text("dueDate", "2026-11-30")
            .add_part("file", Part::bytes(b"call script".to_vec()).file_name("script.txt"));
        let created = server
            .post("/api/v0.1/tasks")
            .add_header("authorization", bearer(&owner))
            .multipart(form)
            .await;
        created.assert_status(StatusCode::CREATED);
        let task: TaskResponse = created.json();
        assert_eq!(task.status, TaskStatus::Pending);
        let path = task.document_path.clone().expect("stored brief");
        assert!(dir.path().join("upload").join(&path).exists());

        let duplicate = MultipartForm::new()
            .add_text("profileId", profile.id.to_string())
            .add_text("title", "Call the Q3 list")
            .add_part("file", Part::bytes(b"again".to_vec()).file_name("again.txt"));
        server
            .post("/api/v0.1/tasks")
            .add_header("authorization", bearer(&owner))
            .multipart(duplicate)
            .await
            .assert_status(StatusCode::CONFLICT);

        let updated: TaskResponse = server
            .patch(&format!("/api/v0.1/tasks/{}", task.task_id))
            .add_header("authorization", bearer(&owner))
            .json(&json!({"status": "COMPLETED"}))
            .await
            .json();
        assert_eq!(updated.status, TaskStatus::Completed);
    }
}
