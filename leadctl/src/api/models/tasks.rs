//! API models for tasks and task submissions.
//!
//! Creation of both goes through `multipart/form-data` so a document can ride
//! along; the text parts deserialize into [`TaskCreate`] / [`TaskSubmissionCreate`].

use super::pagination::Pagination;
use crate::db::models::tasks::{SubmissionStatus, TaskDBResponse, TaskStatus, TaskSubmissionDBResponse};
use crate::types::{ProfileId, TaskId, TaskSubmissionId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Text parts of the task upload form. The `document` part is optional.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreate {
    #[schema(value_type = String, format = "uuid")]
    pub profile_id: ProfileId,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    #[schema(value_type = String, format = "uuid")]
    pub task_id: TaskId,
    #[schema(value_type = String, format = "uuid")]
    pub profile_id: ProfileId,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub due_date: Option<NaiveDate>,
    pub document_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListTasksQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    #[param(value_type = Option<String>, format = "uuid")]
    pub profile_id: Option<ProfileId>,
    #[param(inline)]
    pub status: Option<TaskStatus>,
}

impl From<TaskDBResponse> for TaskResponse {
    fn from(db: TaskDBResponse) -> Self {
        Self {
            task_id: db.id,
            profile_id: db.profile_id,
            title: db.title,
            description: db.description,
            status: db.status,
            due_date: db.due_date,
            document_path: db.document_path,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskSubmissionCreate {
    #[schema(value_type = String, format = "uuid")]
    pub task_id: TaskId,
    pub content: Option<String>,
}

/// Submitters may edit `content`; reviewers set `status` and `feedback`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskSubmissionUpdate {
    pub content: Option<String>,
    pub status: Option<SubmissionStatus>,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskSubmissionResponse {
    #[schema(value_type = String, format = "uuid")]
    pub submission_id: TaskSubmissionId,
    #[schema(value_type = String, format = "uuid")]
    pub task_id: TaskId,
    #[schema(value_type = String, format = "uuid")]
    pub profile_id: ProfileId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub content: Option<String>,
    pub document_path: Option<String>,
    pub status: SubmissionStatus,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListTaskSubmissionsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    #[param(value_type = Option<String>, format = "uuid")]
    pub task_id: Option<TaskId>,
    #[param(value_type = Option<String>, format = "uuid")]
    pub profile_id: Option<ProfileId>,
    #[param(value_type = Option<String>, format = "uuid")]
    pub user_id: Option<UserId>,
    #[param(inline)]
    pub status: Option<SubmissionStatus>,
}

impl From<TaskSubmissionDBResponse> for TaskSubmissionResponse {
    fn from(db: TaskSubmissionDBResponse) -> Self {
        Self {
            submission_id: db.id,
            task_id: db.task_id,
            profile_id: db.profile_id,
            user_id: db.user_id,
            content: db.content,
            document_path: db.document_path,
            status: db.status,
            feedback: db.feedback,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
