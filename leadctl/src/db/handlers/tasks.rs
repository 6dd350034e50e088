//! Database repositories for tasks and task submissions.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::tasks::{
        SubmissionStatus, TaskCreateDBRequest, TaskDBResponse, TaskStatus, TaskSubmissionCreateDBRequest, TaskSubmissionDBResponse,
        TaskSubmissionUpdateDBRequest, TaskUpdateDBRequest,
    },
};
use crate::types::{ProfileId, TaskId, TaskSubmissionId, UserId, abbrev_uuid};
use sqlx::PgConnection;
use tracing::instrument;

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub profile_id: Option<ProfileId>,
    pub status: Option<TaskStatus>,
    pub offset: i64,
    pub limit: i64,
}

const TASK_FILTER: &str = r#"
    WHERE ($1::uuid IS NULL OR profile_id = $1)
      AND ($2::task_status IS NULL OR status = $2)
"#;

pub struct Tasks<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Tasks<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Tasks<'c> {
    type CreateRequest = TaskCreateDBRequest;
    type UpdateRequest = TaskUpdateDBRequest;
    type Response = TaskDBResponse;
    type Id = TaskId;
    type Filter = TaskFilter;

    #[instrument(skip(self, request), fields(profile_id = %abbrev_uuid(&request.profile_id), title = %request.title), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let task = sqlx::query_as::<_, TaskDBResponse>(
            r#"
            INSERT INTO tasks (profile_id, title, description, due_date, document_path)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(request.profile_id)
        .bind(&request.title)
        .bind(&request.description)
        .bind(request.due_date)
        .bind(&request.document_path)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(task)
    }

    #[instrument(skip(self), fields(task_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let task = sqlx::query_as::<_, TaskDBResponse>("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(task)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, offset = filter.offset), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let sql = format!("SELECT * FROM tasks {TASK_FILTER} ORDER BY due_date ASC NULLS LAST, created_at DESC, id LIMIT $3 OFFSET $4");
        let tasks = sqlx::query_as::<_, TaskDBResponse>(&sql)
            .bind(filter.profile_id)
            .bind(filter.status)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(tasks)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM tasks {TASK_FILTER}");
        let total = sqlx::query_scalar::<_, i64>(&sql)
            .bind(filter.profile_id)
            .bind(filter.status)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(total)
    }

    #[instrument(skip(self), fields(task_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(task_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let task = sqlx::query_as::<_, TaskDBResponse>(
            r#"
            UPDATE tasks SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                status = COALESCE($4, status),
                due_date = COALESCE($5, due_date),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.title)
        .bind(&request.description)
        .bind(request.status)
        .bind(request.due_date)
        .fetch_optional(&mut *self.db)
        .await?;
        task.ok_or(DbError::NotFound)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskSubmissionFilter {
    pub task_id: Option<TaskId>,
    pub profile_id: Option<ProfileId>,
    pub user_id: Option<UserId>,
    pub status: Option<SubmissionStatus>,
    pub offset: i64,
    pub limit: i64,
}

const SUBMISSION_SELECT: &str = r#"
    SELECT s.id, s.task_id, t.profile_id, s.user_id, s.content, s.document_path, s.status, s.feedback,
        s.created_at, s.updated_at
    FROM task_submissions s
    JOIN tasks t ON t.id = s.task_id
"#;

const SUBMISSION_FILTER: &str = r#"
    WHERE ($1::uuid IS NULL OR s.task_id = $1)
      AND ($2::uuid IS NULL OR t.profile_id = $2)
      AND ($3::uuid IS NULL OR s.user_id = $3)
      AND ($4::submission_status IS NULL OR s.status = $4)
"#;

async fn fetch_submission(conn: &mut PgConnection, id: TaskSubmissionId) -> Result<Option<TaskSubmissionDBResponse>> {
    let sql = format!("{SUBMISSION_SELECT} WHERE s.id = $1");
    Ok(sqlx::query_as::<_, TaskSubmissionDBResponse>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?)
}

pub struct TaskSubmissions<'c> {
    db: &'c mut PgConnection,
}

impl<'c> TaskSubmissions<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for TaskSubmissions<'c> {
    type CreateRequest = TaskSubmissionCreateDBRequest;
    type UpdateRequest = TaskSubmissionUpdateDBRequest;
    type Response = TaskSubmissionDBResponse;
    type Id = TaskSubmissionId;
    type Filter = TaskSubmissionFilter;

    #[instrument(skip(self, request), fields(task_id = %abbrev_uuid(&request.task_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let id: TaskSubmissionId = sqlx::query_scalar(
            "INSERT INTO task_submissions (task_id, user_id, content, document_path) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(request.task_id)
        .bind(request.user_id)
        .bind(&request.content)
        .bind(&request.document_path)
        .fetch_one(&mut *self.db)
        .await?;
        fetch_submission(self.db, id).await?.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), fields(submission_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        fetch_submission(self.db, id).await
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, offset = filter.offset), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let sql = format!("{SUBMISSION_SELECT} {SUBMISSION_FILTER} ORDER BY s.created_at DESC, s.id LIMIT $5 OFFSET $6");
        let submissions = sqlx::query_as::<_, TaskSubmissionDBResponse>(&sql)
            .bind(filter.task_id)
            .bind(filter.profile_id)
            .bind(filter.user_id)
            .bind(filter.status)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(submissions)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM task_submissions s JOIN tasks t ON t.id = s.task_id {SUBMISSION_FILTER}");
        let total = sqlx::query_scalar::<_, i64>(&sql)
            .bind(filter.task_id)
            .bind(filter.profile_id)
            .bind(filter.user_id)
            .bind(filter.status)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(total)
    }

    #[instrument(skip(self), fields(submission_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM task_submissions WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(submission_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let updated: Option<TaskSubmissionId> = sqlx::query_scalar(
            r#"
            UPDATE task_submissions SET
                content = COALESCE($2, content),
                status = COALESCE($3, status),
                feedback = COALESCE($4, feedback),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(&request.content)
        .bind(request.status)
        .bind(&request.feedback)
        .fetch_optional(&mut *self.db)
        .await?;

        if updated.is_none() {
            return Err(DbError::NotFound);
        }
        fetch_submission(self.db, id).await?.ok_or(DbError::NotFound)
    }
}

#[cfg(all(test, feature = "live-db-tests"))]
mod tests {
    use super::*;
    use crate::test_utils::create_test_profile;
    use chrono::NaiveDate;
    use sqlx::PgPool;

    fn task(profile_id: ProfileId, title: &str) -> TaskCreateDBRequest {
        TaskCreateDBRequest {
            profile_id,
            title: title.to_string(),
            description: None,
            due_date: NaiveDate::from_ymd_opt(2026, 11, 30),
            document_path: None,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_task_title_unique_per_profile(pool: PgPool) {
        let profile = create_test_profile(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Tasks::new(&mut conn);

        let created = repo.create(&task(profile.id, "Call the top 20")).await.unwrap();
        assert_eq!(created.status, TaskStatus::Pending);

        let dup = repo.create(&task(profile.id, "Call the top 20")).await;
        assert!(matches!(dup, Err(DbError::UniqueViolation { .. })));

        let filter = TaskFilter {
            profile_id: Some(profile.id),
            limit: 10,
            ..Default::default()
        };
        assert_eq!(repo.count(&filter).await.unwrap(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_submission_carries_task_profile(pool: PgPool) {
        let profile = create_test_profile(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let created = Tasks::new(&mut conn).create(&task(profile.id, "Weekly report")).await.unwrap();

        let mut submissions = TaskSubmissions::new(&mut conn);
        let submission = submissions
            .create(&TaskSubmissionCreateDBRequest {
                task_id: created.id,
                user_id: profile.user_id,
                content: Some("Done".to_string()),
                document_path: None,
            })
            .await
            .unwrap();
        assert_eq!(submission.profile_id, profile.id);
        assert_eq!(submission.status, SubmissionStatus::Pending);

        let reviewed = submissions
            .update(
                submission.id,
                &TaskSubmissionUpdateDBRequest {
                    status: Some(SubmissionStatus::Accepted),
                    feedback: Some("Nice".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(reviewed.status, SubmissionStatus::Accepted);
        assert_eq!(reviewed.content.as_deref(), Some("Done"));

        let by_profile = TaskSubmissionFilter {
            profile_id: Some(profile.id),
            limit: 10,
            ..Default::default()
        };
        assert_eq!(submissions.count(&by_profile).await.unwrap(), 1);
    }
}
