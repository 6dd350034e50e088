//! Database models for guest requests.

use crate::types::{CategoryId, GuestId, GuestRequestId, ServiceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "request_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Resolved,
}

#[derive(Debug, Clone)]
pub struct GuestRequestCreateDBRequest {
    pub guest_id: GuestId,
    pub service_id: ServiceId,
    pub category_id: Option<CategoryId>,
}

#[derive(Debug, Clone, Default)]
pub struct GuestRequestUpdateDBRequest {
    pub service_id: Option<ServiceId>,
    pub category_id: Option<CategoryId>,
    /// Moving to `RESOLVED` stamps `resolved_at`; moving back clears it
    pub status: Option<RequestStatus>,
}

#[derive(Debug, Clone, FromRow)]
pub struct GuestRequestDBResponse {
    pub id: GuestRequestId,
    pub guest_id: GuestId,
    pub service_id: ServiceId,
    pub category_id: Option<CategoryId>,
    pub status: RequestStatus,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
