//! API request/response models for warm leads.

use super::pagination::Pagination;
use crate::db::models::warm_leads::{WarmLeadDBResponse, WarmLeadStatus};
use crate::types::{ProfileId, WarmLeadId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WarmLeadCreate {
    #[schema(value_type = String, format = "uuid")]
    pub profile_id: ProfileId,
    pub company_name: Option<String>,
    pub contact_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub status: Option<WarmLeadStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WarmLeadUpdate {
    pub company_name: Option<String>,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub status: Option<WarmLeadStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WarmLeadResponse {
    #[schema(value_type = String, format = "uuid")]
    pub warm_lead_id: WarmLeadId,
    #[schema(value_type = String, format = "uuid")]
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

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListWarmLeadsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    #[param(value_type = Option<String>, format = "uuid")]
    pub profile_id: Option<ProfileId>,
    #[param(inline)]
    pub status: Option<WarmLeadStatus>,
    pub email: Option<String>,
}

impl From<WarmLeadDBResponse> for WarmLeadResponse {
    fn from(db: WarmLeadDBResponse) -> Self {
        Self {
            warm_lead_id: db.id,
            profile_id: db.profile_id,
            company_name: db.company_name,
            contact_name: db.contact_name,
            email: db.email,
            phone: db.phone,
            notes: db.notes,
            status: db.status,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
