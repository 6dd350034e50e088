//! Submissions against a task: the submitter's work plus a reviewer verdict.
//!
//! Any member of the task's profile may submit. Only the submitter may edit
//! the content, and only administrators may set `status` and `feedback`.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use sqlx::PgConnection;

use super::{tasks::accessible_task, uploads::UploadForm};
use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        tasks::{ListTaskSubmissionsQuery, TaskSubmissionCreate, TaskSubmissionResponse, TaskSubmissionUpdate},
        users::CurrentUser,
    },
    auth::permissions::{RequiresPermission, ensure_profile_access, operation, require_permission, resource},
    db::{
        handlers::{Repository, TaskSubmissions, tasks::TaskSubmissionFilter},
        models::tasks::{TaskSubmissionCreateDBRequest, TaskSubmissionDBResponse, TaskSubmissionUpdateDBRequest},
    },
    errors::{Error, Result},
    storage::UploadArea,
    types::{Operation, Resource, TaskSubmissionId},
};

async fn accessible_submission(conn: &mut PgConnection, user: &CurrentUser, id: TaskSubmissionId) -> Result<TaskSubmissionDBResponse> {
    let submission = TaskSubmissions::new(&mut *conn).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Task submission".to_string(),
        id: id.to_string(),
    })?;
    ensure_profile_access(conn, user, submission.profile_id).await?;
    Ok(submission)
}

#[utoipa::path(
    get,
    path = "/task-submissions",
    tag = "tasks",
    summary = "List task submissions",
    description = "Non-administrators must filter by `taskId` or `profileId`.",
    params(ListTaskSubmissionsQuery),
    responses((status = 200, description = "Page of submissions", body = PaginatedResponse<TaskSubmissionResponse>)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_task_submissions(
    State(state): State<AppState>,
    Query(query): Query<ListTaskSubmissionsQuery>,
    current_user: RequiresPermission<resource::TaskSubmissions, operation::ReadOwn>,
) -> Result<Json<PaginatedResponse<TaskSubmissionResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !current_user.is_admin() {
        match (query.task_id, query.profile_id) {
            (Some(task_id), _) => {
                accessible_task(&mut conn, &current_user, task_id).await?;
            }
            (None, Some(profile_id)) => {
                ensure_profile_access(&mut conn, &current_user, profile_id).await?;
            }
            (None, None) => {
                return Err(Error::BadRequest {
                    message: "taskId or profileId is required".to_string(),
                });
            }
        }
    }

    let filter = TaskSubmissionFilter {
        task_id: query.task_id,
        profile_id: query.profile_id,
        user_id: query.user_id,
        status: query.status,
        offset: query.pagination.offset(),
        limit: query.pagination.limit(),
    };
    let mut repo = TaskSubmissions::new(&mut conn);
    let submissions = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;
    Ok(Json(PaginatedResponse::new(
        submissions.into_iter().map(TaskSubmissionResponse::from).collect(),
        total,
        &query.pagination,
    )))
}

async fn insert_submission(state: &AppState, user: &CurrentUser, form: &UploadForm) -> Result<TaskSubmissionDBResponse> {
    let create: TaskSubmissionCreate = form.parse()?;
    if create.content.is_none() && form.file.is_none() {
        return Err(Error::BadRequest {
            message: "A submission needs content or a file".to_string(),
        });
    }
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    accessible_task(&mut conn, user, create.task_id).await?;
    let submission = TaskSubmissions::new(&mut conn)
        .create(&TaskSubmissionCreateDBRequest {
            task_id: create.task_id,
            user_id: user.id,
            content: create.content,
            document_path: form.document_path(),
        })
        .await?;
    Ok(submission)
}

#[utoipa::path(
    post,
    path = "/task-submissions",
    tag = "tasks",
    summary = "Submit work for a task",
    description = "Multipart form with `taskId`, optional `content` and an optional `file`.",
    request_body(content = TaskSubmissionCreate, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Submission recorded", body = TaskSubmissionResponse),
        (status = 404, description = "Unknown task"),
        (status = 413, description = "File too large"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_task_submission(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::TaskSubmissions, operation::CreateOwn>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<TaskSubmissionResponse>)> {
    let mut form = UploadForm::read(&state.uploads, UploadArea::TaskSubmissions, multipart).await?;
    let result = insert_submission(&state, &current_user, &form).await;
    let submission = form.settle(&state.uploads, result)?;
    Ok((StatusCode::CREATED, Json(TaskSubmissionResponse::from(submission))))
}

#[utoipa::path(
    get,
    path = "/task-submissions/{id}",
    tag = "tasks",
    summary = "Get task submission",
    params(("id" = String, Path, format = "uuid", description = "Submission ID")),
    responses(
        (status = 200, description = "Submission", body = TaskSubmissionResponse),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_task_submission(
    State(state): State<AppState>,
    Path(id): Path<TaskSubmissionId>,
    current_user: RequiresPermission<resource::TaskSubmissions, operation::ReadOwn>,
) -> Result<Json<TaskSubmissionResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let submission = accessible_submission(&mut conn, &current_user, id).await?;
    Ok(Json(TaskSubmissionResponse::from(submission)))
}

#[utoipa::path(
    patch,
    path = "/task-submissions/{id}",
    tag = "tasks",
    summary = "Update task submission",
    params(("id" = String, Path, format = "uuid", description = "Submission ID")),
    request_body = TaskSubmissionUpdate,
    responses(
        (status = 200, description = "Updated submission", body = TaskSubmissionResponse),
        (status = 403, description = "Not the submitter, or reviewing without admin rights"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_task_submission(
    State(state): State<AppState>,
    Path(id): Path<TaskSubmissionId>,
    current_user: RequiresPermission<resource::TaskSubmissions, operation::UpdateOwn>,
    Json(update): Json<TaskSubmissionUpdate>,
) -> Result<Json<TaskSubmissionResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let submission = accessible_submission(&mut conn, &current_user, id).await?;

    if update.status.is_some() || update.feedback.is_some() {
        require_permission(&current_user, Resource::TaskSubmissions, Operation::UpdateAll)?;
    }
    if update.content.is_some() && submission.user_id != current_user.id {
        require_permission(&current_user, Resource::TaskSubmissions, Operation::UpdateAll)?;
    }

    let submission = TaskSubmissions::new(&mut conn)
        .update(
            id,
            &TaskSubmissionUpdateDBRequest {
                content: update.content,
                status: update.status,
                feedback: update.feedback,
            },
        )
        .await?;
    Ok(Json(TaskSubmissionResponse::from(submission)))
}

#[utoipa::path(
    delete,
    path = "/task-submissions/{id}",
    tag = "tasks",
    summary = "Delete task submission",
    params(("id" = String, Path, format = "uuid", description = "Submission ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_task_submission(
    State(state): State<AppState>,
    Path(id): Path<TaskSubmissionId>,
    current_user: RequiresPermission<resource::TaskSubmissions, operation::DeleteOwn>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let submission = accessible_submission(&mut conn, &current_user, id).await?;
    TaskSubmissions::new(&mut conn).delete(id).await?;
    if let Some(path) = submission.document_path {
        state.uploads.remove_in_background(path);
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(all(test, feature = "live-db-tests"))]
mod tests {
    use crate::api::models::roles::ADMIN;
    use crate::api::models::tasks::TaskSubmissionResponse;
    use crate::db::handlers::{Repository, Tasks};
    use crate::db::models::tasks::{SubmissionStatus, TaskCreateDBRequest};
    use crate::test_utils::{bearer, create_test_app, create_test_profile, create_test_user, profile_owner};
    use axum::http::StatusCode;
    use axum_test::multipart::MultipartForm;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_submit_and_review(pool: PgPool) {
        let (server, _bg, _dir) = create_test_app(pool.clone()).await;
        let profile = create_test_profile(&pool).await;
        let owner = profile_owner(&pool, &profile).await;
        let admin = create_test_user(&pool, ADMIN).await;
        let task = {
            let mut conn = pool.acquire().await.unwrap();
            Tasks::new(&mut conn)
                .create(&TaskCreateDBRequest {
                    profile_id: profile.id,
                    title: "Qualify list".to_string(),
                    description: None,
                    due_date: None,
                    document_path: None,
                })
                .await
                .unwrap()
        };

        server
            .post("/api/v0.1/task-submissions")
            .add_header("authorization", bearer(&owner))
            .multipart(MultipartForm::new().add_text("taskId", task.id.to_string()))
            .await
            .assert_status_bad_request();

        let created = server
            .post("/api/v0.1/task-submissions")
            .add_header("authorization", bearer(&owner))
            .multipart(
                MultipartForm::new()
                    .add_text("taskId", task.id.to_string())
                    .add_text("content", "12 qualified, 3 dead"),
            )
            .await;
        created.assert_status(StatusCode::CREATED);
        let submission: TaskSubmissionResponse = created.json();
        assert_eq!(submission.profile_id, profile.id);
        assert_eq!(submission.user_id, owner.id);

        server
            .patch(&format!("/api/v0.1/task-submissions/{}", submission.submission_id))
            .add_header("authorization", bearer(&owner))
            .json(&json!({"status": "ACCEPTED"}))
            .await
            .assert_status_forbidden();

        let reviewed: TaskSubmissionResponse = server
            .patch(&format!("/api/v0.1/task-submissions/{}", submission.submission_id))
            .add_header("authorization", bearer(&admin))
            .json(&json!({"status": "ACCEPTED", "feedback": "Nice"}))
            .await
            .json();
        assert_eq!(reviewed.status, SubmissionStatus::Accepted);
    }
}
