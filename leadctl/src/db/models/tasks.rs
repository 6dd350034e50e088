//! Database models for tasks and task submissions.

use crate::types::{ProfileId, TaskId, TaskSubmissionId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "task_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "submission_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone)]
pub struct TaskCreateDBRequest {
    pub profile_id: ProfileId,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub document_path: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskUpdateDBRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, FromRow)]
pub struct TaskDBResponse {
    pub id: TaskId,
    pub profile_id: ProfileId,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub due_date: Option<NaiveDate>,
    pub document_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TaskSubmissionCreateDBRequest {
    pub task_id: TaskId,
    pub user_id: UserId,
    pub content: Option<String>,
    pub document_path: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskSubmissionUpdateDBRequest {
    pub content: Option<String>,
    pub status: Option<SubmissionStatus>,
    pub feedback: Option<String>,
}

/// Submissions carry the profile of their task so access checks need no second lookup.
#[derive(Debug, Clone, FromRow)]
pub struct TaskSubmissionDBResponse {
    pub id: TaskSubmissionId,
    pub task_id: TaskId,
    pub profile_id: ProfileId,
    pub user_id: UserId,
    pub content: Option<String>,
    pub document_path: Option<String>,
    pub status: SubmissionStatus,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
