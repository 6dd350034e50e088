//! API models for time slots and appointment booking.

use super::pagination::Pagination;
use crate::db::models::scheduling::{AppointmentDBResponse, AppointmentStatus, TimeSlotDBResponse};
use crate::types::{AppointmentId, GuestId, TimeSlotId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlotCreate {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlotUpdate {
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub is_booked: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlotResponse {
    #[schema(value_type = String, format = "uuid")]
    pub time_slot_id: TimeSlotId,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_booked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Anonymous callers only ever see unbooked slots; `isBooked` is honoured for administrators.
#[serde_as]
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListTimeSlotsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub is_booked: Option<bool>,
    pub starts_after: Option<DateTime<Utc>>,
}

impl From<TimeSlotDBResponse> for TimeSlotResponse {
    fn from(db: TimeSlotDBResponse) -> Self {
        Self {
            time_slot_id: db.id,
            starts_at: db.starts_at,
            ends_at: db.ends_at,
            is_booked: db.is_booked,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Public booking request: guest contact details plus the slot to reserve.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentBooking {
    pub company_name: String,
    pub contact_name: String,
    pub email: String,
    pub phone: Option<String>,
    #[schema(value_type = String, format = "uuid")]
    pub time_slot_id: TimeSlotId,
    pub topic: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentResponse {
    #[schema(value_type = String, format = "uuid")]
    pub appointment_id: AppointmentId,
    #[schema(value_type = String, format = "uuid")]
    pub guest_id: GuestId,
    #[schema(value_type = String, format = "uuid")]
    pub time_slot_id: TimeSlotId,
    pub topic: String,
    /// Empty when the meeting provider could not be reached at booking time
    pub meeting_id: Option<String>,
    pub join_url: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListAppointmentsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    #[param(value_type = Option<String>, format = "uuid")]
    pub guest_id: Option<GuestId>,
    #[param(inline)]
    pub status: Option<AppointmentStatus>,
}

impl From<AppointmentDBResponse> for AppointmentResponse {
    fn from(db: AppointmentDBResponse) -> Self {
        Self {
            appointment_id: db.id,
            guest_id: db.guest_id,
            time_slot_id: db.time_slot_id,
            topic: db.topic,
            meeting_id: db.meeting_id,
            join_url: db.join_url,
            status: db.status,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
