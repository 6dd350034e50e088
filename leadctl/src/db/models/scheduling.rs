//! Database models for time slots and appointments.

use crate::types::{AppointmentId, GuestId, TimeSlotId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "appointment_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Scheduled,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct TimeSlotCreateDBRequest {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct TimeSlotUpdateDBRequest {
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub is_booked: Option<bool>,
}

#[derive(Debug, Clone, FromRow)]
pub struct TimeSlotDBResponse {
    pub id: TimeSlotId,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_booked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TimeSlotDBResponse {
    pub fn duration_minutes(&self) -> i64 {
        (self.ends_at - self.starts_at).num_minutes()
    }
}

#[derive(Debug, Clone)]
pub struct AppointmentCreateDBRequest {
    pub guest_id: GuestId,
    pub time_slot_id: TimeSlotId,
    pub topic: String,
}

/// Only the meeting fields and status change after booking.
#[derive(Debug, Clone, Default)]
pub struct AppointmentUpdateDBRequest {
    pub meeting_id: Option<String>,
    pub join_url: Option<String>,
    pub status: Option<AppointmentStatus>,
}

#[derive(Debug, Clone, FromRow)]
pub struct AppointmentDBResponse {
    pub id: AppointmentId,
    pub guest_id: GuestId,
    pub time_slot_id: TimeSlotId,
    pub topic: String,
    pub meeting_id: Option<String>,
    pub join_url: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
