//! Database models for warm leads.

use crate::types::{ProfileId, WarmLeadId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "warm_lead_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarmLeadStatus {
    New,
    Contacted,
    Converted,
    Dropped,
}

#[derive(Debug, Clone)]
pub struct WarmLeadCreateDBRequest {
    pub profile_id: ProfileId,
    pub company_name: Option<String>,
    pub contact_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub status: Option<WarmLeadStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct WarmLeadUpdateDBRequest {
    pub company_name: Option<String>,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub status: Option<WarmLeadStatus>,
}

#[derive(Debug, Clone, FromRow)]
pub struct WarmLeadDBResponse {
    pub id: WarmLeadId,
    pub profile_id: ProfileId,
    pub company_name: Option<String>,
    pub contact_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub status: WarmLeadStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
