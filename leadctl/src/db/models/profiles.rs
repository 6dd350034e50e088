//! Database models for profiles and their memberships.

use crate::types::{ProfileId, ServiceId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct ProfileCreateDBRequest {
    pub user_id: UserId,
    pub service_id: ServiceId,
    pub name: String,
    pub sheet_url: Option<String>,
    pub sheet_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdateDBRequest {
    pub service_id: Option<ServiceId>,
    pub name: Option<String>,
    pub sheet_url: Option<String>,
    pub sheet_name: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ProfileDBResponse {
    pub id: ProfileId,
    /// Owner
    pub user_id: UserId,
    pub service_id: ServiceId,
    pub name: String,
    pub sheet_url: Option<String>,
    pub sheet_name: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileDBResponse {
    /// The bound spreadsheet, when both halves of the binding are present.
    pub fn sheet_binding(&self) -> Option<(&str, &str)> {
        match (self.sheet_url.as_deref(), self.sheet_name.as_deref()) {
            (Some(url), Some(name)) if !url.is_empty() && !name.is_empty() => Some((url, name)),
            _ => None,
        }
    }
}
