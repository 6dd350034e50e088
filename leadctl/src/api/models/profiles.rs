//! API request/response models for profiles.

use super::pagination::Pagination;
use crate::db::models::profiles::ProfileDBResponse;
use crate::types::{ProfileId, ServiceId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileCreate {
    /// Owner; defaults to the caller. Only administrators may create profiles for someone else.
    #[schema(value_type = Option<String>, format = "uuid")]
    pub user_id: Option<UserId>,
    #[schema(value_type = String, format = "uuid")]
    pub service_id: ServiceId,
    pub name: String,
    pub sheet_url: Option<String>,
    pub sheet_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[schema(value_type = Option<String>, format = "uuid")]
    pub service_id: Option<ServiceId>,
    pub name: Option<String>,
    pub sheet_url: Option<String>,
    pub sheet_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    #[schema(value_type = String, format = "uuid")]
    pub profile_id: ProfileId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    #[schema(value_type = String, format = "uuid")]
    pub service_id: ServiceId,
    pub name: String,
    pub sheet_url: Option<String>,
    pub sheet_name: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListProfilesQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    /// Profiles owned by or shared with this user (admins only; others always see their own)
    #[param(value_type = Option<String>, format = "uuid")]
    pub user_id: Option<UserId>,
    #[param(value_type = Option<String>, format = "uuid")]
    pub service_id: Option<ServiceId>,
}

impl From<ProfileDBResponse> for ProfileResponse {
    fn from(db: ProfileDBResponse) -> Self {
        Self {
            profile_id: db.id,
            user_id: db.user_id,
            service_id: db.service_id,
            name: db.name,
            sheet_url: db.sheet_url,
            sheet_name: db.sheet_name,
            last_synced_at: db.last_synced_at,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
