//! API models for jobs, skills and job applications.

use super::pagination::Pagination;
use crate::db::models::careers::{ApplicationDBResponse, ApplicationStatus, EmploymentType, JobDBResponse, SkillDBResponse};
use crate::types::{ApplicationId, JobId, ServiceId, SkillId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobCreate {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    /// Defaults to `FULL_TIME`
    pub employment_type: Option<EmploymentType>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub service_id: Option<ServiceId>,
    /// Defaults to true
    pub is_open: Option<bool>,
    #[serde(default)]
    #[schema(value_type = Vec<String>)]
    pub skill_ids: Vec<SkillId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub employment_type: Option<EmploymentType>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub service_id: Option<ServiceId>,
    pub is_open: Option<bool>,
}

/// Replaces every skill link of a job
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobSkillsUpdate {
    #[schema(value_type = Vec<String>)]
    pub skill_ids: Vec<SkillId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    #[schema(value_type = String, format = "uuid")]
    pub job_id: JobId,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub employment_type: EmploymentType,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub service_id: Option<ServiceId>,
    pub is_open: bool,
    #[schema(value_type = Vec<String>)]
    pub skill_ids: Vec<SkillId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[serde_as]
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListJobsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub is_open: Option<bool>,
    #[param(inline)]
    pub employment_type: Option<EmploymentType>,
    #[param(value_type = Option<String>, format = "uuid")]
    pub service_id: Option<ServiceId>,
    #[param(value_type = Option<String>, format = "uuid")]
    pub skill_id: Option<SkillId>,
}

impl From<JobDBResponse> for JobResponse {
    fn from(db: JobDBResponse) -> Self {
        Self {
            job_id: db.id,
            title: db.title,
            description: db.description,
            location: db.location,
            employment_type: db.employment_type,
            service_id: db.service_id,
            is_open: db.is_open,
            skill_ids: db.skill_ids,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SkillCreate {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SkillUpdate {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SkillResponse {
    #[schema(value_type = String, format = "uuid")]
    pub skill_id: SkillId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListSkillsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    pub name: Option<String>,
}

impl From<SkillDBResponse> for SkillResponse {
    fn from(db: SkillDBResponse) -> Self {
        Self {
            skill_id: db.id,
            name: db.name,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Text parts of the application upload form. The `resume` part is optional.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationCreate {
    #[schema(value_type = String, format = "uuid")]
    pub job_id: JobId,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub cover_letter: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationUpdate {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub cover_letter: Option<String>,
    pub status: Option<ApplicationStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationResponse {
    #[schema(value_type = String, format = "uuid")]
    pub application_id: ApplicationId,
    #[schema(value_type = String, format = "uuid")]
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

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListApplicationsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    #[param(value_type = Option<String>, format = "uuid")]
    pub job_id: Option<JobId>,
    pub email: Option<String>,
    #[param(inline)]
    pub status: Option<ApplicationStatus>,
}

impl From<ApplicationDBResponse> for ApplicationResponse {
    fn from(db: ApplicationDBResponse) -> Self {
        Self {
            application_id: db.id,
            job_id: db.job_id,
            full_name: db.full_name,
            email: db.email,
            phone: db.phone,
            cover_letter: db.cover_letter,
            resume_path: db.resume_path,
            status: db.status,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
