//! Uploaded files owned, directly or through cascading foreign keys, by a row.
//!
//! Deleting a profile, user, task or job cascades into rows that carry
//! `document_path`/`resume_path` columns. Collect those paths inside the
//! deleting transaction, then unlink them once it commits.

use crate::db::errors::Result;
use crate::types::{JobId, ProfileId, TaskId, UserId};
use sqlx::PgConnection;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOwner {
    /// Tasks and tickets of the profile, and submissions to those tasks
    Profile(ProfileId),
    /// Everything under the profiles the user owns, plus their own submissions and tickets
    User(UserId),
    /// The task's document and its submissions
    Task(TaskId),
    /// Résumés attached to the job's applications
    Job(JobId),
}

const PROFILE_UPLOADS: &str = r#"
    SELECT document_path FROM tasks WHERE profile_id = ANY($1) AND document_path IS NOT NULL
    UNION
    SELECT s.document_path FROM task_submissions s JOIN tasks t ON t.id = s.task_id
    WHERE t.profile_id = ANY($1) AND s.document_path IS NOT NULL
    UNION
    SELECT document_path FROM tickets WHERE profile_id = ANY($1) AND document_path IS NOT NULL
"#;

/// Relative upload paths that deleting `owner` would leave without a row.
#[instrument(skip(conn), err)]
pub async fn orphaned_by(conn: &mut PgConnection, owner: UploadOwner) -> Result<Vec<String>> {
    let paths = match owner {
        UploadOwner::Profile(id) => {
            sqlx::query_scalar::<_, String>(PROFILE_UPLOADS)
                .bind(vec![id])
                .fetch_all(&mut *conn)
                .await?
        }
        UploadOwner::User(id) => {
            let owned: Vec<ProfileId> = sqlx::query_scalar("SELECT id FROM profiles WHERE user_id = $1")
                .bind(id)
                .fetch_all(&mut *conn)
                .await?;
            let sql = format!(
                r#"
                {PROFILE_UPLOADS}
                UNION
                SELECT document_path FROM task_submissions WHERE user_id = $2 AND document_path IS NOT NULL
                UNION
                SELECT document_path FROM tickets WHERE user_id = $2 AND document_path IS NOT NULL
                "#
            );
            sqlx::query_scalar::<_, String>(&sql)
                .bind(owned)
                .bind(id)
                .fetch_all(&mut *conn)
                .await?
        }
        UploadOwner::Task(id) => {
            sqlx::query_scalar::<_, String>(
                r#"
                SELECT document_path FROM tasks WHERE id = $1 AND document_path IS NOT NULL
                UNION
                SELECT document_path FROM task_submissions WHERE task_id = $1 AND document_path IS NOT NULL
                "#,
            )
            .bind(id)
            .fetch_all(&mut *conn)
            .await?
        }
        UploadOwner::Job(id) => {
            sqlx::query_scalar::<_, String>("SELECT resume_path FROM applications WHERE job_id = $1 AND resume_path IS NOT NULL")
                .bind(id)
                .fetch_all(&mut *conn)
                .await?
        }
    };
    debug!(count = paths.len(), "Collected orphaned uploads");
    Ok(paths)
}
