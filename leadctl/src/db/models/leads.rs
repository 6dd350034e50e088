//! Database models for leads.

use crate::types::{PipelineId, ProfileId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// `SALE_MADE` never persists in `leads`: it is the signal to move the row into `sales`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "lead_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStatus {
    Lead,
    Contacted,
    FollowUp,
    NotInterested,
    Other,
    SaleMade,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::Lead => "LEAD",
            LeadStatus::Contacted => "CONTACTED",
            LeadStatus::FollowUp => "FOLLOW_UP",
            LeadStatus::NotInterested => "NOT_INTERESTED",
            LeadStatus::Other => "OTHER",
            LeadStatus::SaleMade => "SALE_MADE",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LeadCreateDBRequest {
    /// Reuse an id coming from `sales`; a fresh one is generated when absent
    pub id: Option<PipelineId>,
    pub profile_id: ProfileId,
    pub external_id: Option<String>,
    pub record: serde_json::Value,
    pub status: LeadStatus,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LeadUpdateDBRequest {
    pub status: Option<LeadStatus>,
    pub comment: Option<String>,
    pub record: Option<serde_json::Value>,
}

#[derive(Debug, Clone, FromRow)]
pub struct LeadDBResponse {
    pub id: PipelineId,
    pub profile_id: ProfileId,
    pub external_id: Option<String>,
    pub record: serde_json::Value,
    pub status: LeadStatus,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
