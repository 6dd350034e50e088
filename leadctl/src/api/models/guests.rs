//! API request/response models for guests and guest requests.

use super::pagination::Pagination;
use crate::db::models::{
    guest_requests::{GuestRequestDBResponse, RequestStatus},
    guests::GuestDBResponse,
};
use crate::types::{CategoryId, GuestId, GuestRequestId, ServiceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GuestCreate {
    pub company_name: String,
    pub contact_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GuestUpdate {
    pub company_name: Option<String>,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GuestResponse {
    #[schema(value_type = String, format = "uuid")]
    pub guest_id: GuestId,
    pub company_name: String,
    pub contact_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: Option<String>,
    pub approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[serde_as]
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListGuestsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    pub email: Option<String>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub approved: Option<bool>,
}

impl From<GuestDBResponse> for GuestResponse {
    fn from(db: GuestDBResponse) -> Self {
        Self {
            guest_id: db.id,
            company_name: db.company_name,
            contact_name: db.contact_name,
            email: db.email,
            phone: db.phone,
            message: db.message,
            approved: db.approved,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GuestRequestCreate {
    #[schema(value_type = String, format = "uuid")]
    pub guest_id: GuestId,
    #[schema(value_type = String, format = "uuid")]
    pub service_id: ServiceId,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub category_id: Option<CategoryId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GuestRequestUpdate {
    #[schema(value_type = Option<String>, format = "uuid")]
    pub service_id: Option<ServiceId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub category_id: Option<CategoryId>,
    pub status: Option<RequestStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GuestRequestResponse {
    #[schema(value_type = String, format = "uuid")]
    pub request_id: GuestRequestId,
    #[schema(value_type = String, format = "uuid")]
    pub guest_id: GuestId,
    #[schema(value_type = String, format = "uuid")]
    pub service_id: ServiceId,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub category_id: Option<CategoryId>,
    pub status: RequestStatus,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListGuestRequestsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    #[param(value_type = Option<String>, format = "uuid")]
    pub guest_id: Option<GuestId>,
    #[param(value_type = Option<String>, format = "uuid")]
    pub service_id: Option<ServiceId>,
    #[param(inline)]
    pub status: Option<RequestStatus>,
}

impl From<GuestRequestDBResponse> for GuestRequestResponse {
    fn from(db: GuestRequestDBResponse) -> Self {
        Self {
            request_id: db.id,
            guest_id: db.guest_id,
            service_id: db.service_id,
            category_id: db.category_id,
            status: db.status,
            resolved_at: db.resolved_at,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
