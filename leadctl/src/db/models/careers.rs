//! Database models for the careers subsystem: jobs, skills and applications.

use crate::types::{ApplicationId, JobId, ServiceId, SkillId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "employment_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmploymentType {
    FullTime,
    PartTime,
    Contract,
    Internship,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "application_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Pending,
    Reviewed,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone)]
pub struct JobCreateDBRequest {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub employment_type: Option<EmploymentType>,
    pub service_id: Option<ServiceId>,
    pub is_open: Option<bool>,
    pub skill_ids: Vec<SkillId>,
}

#[derive(Debug, Clone, Default)]
pub struct JobUpdateDBRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub employment_type: Option<EmploymentType>,
    pub service_id: Option<ServiceId>,
    pub is_open: Option<bool>,
}

#[derive(Debug, Clone, FromRow)]
pub struct JobDBResponse {
    pub id: JobId,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub employment_type: EmploymentType,
    pub service_id: Option<ServiceId>,
    pub is_open: bool,
    pub skill_ids: Vec<SkillId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SkillCreateDBRequest {
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct SkillUpdateDBRequest {
    pub name: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct SkillDBResponse {
    pub id: SkillId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ApplicationCreateDBRequest {
    pub job_id: JobId,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub cover_letter: Option<String>,
    pub resume_path: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ApplicationUpdateDBRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub cover_letter: Option<String>,
    pub status: Option<ApplicationStatus>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ApplicationDBResponse {
    pub id: ApplicationId,
    pub job_id: JobId,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub cover_letter: Option<String>,
    pub resume_path: Option<String>,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
