//! Database repositories for time slots and appointments.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::scheduling::{
        AppointmentCreateDBRequest, AppointmentDBResponse, AppointmentStatus, AppointmentUpdateDBRequest, TimeSlotCreateDBRequest,
        TimeSlotDBResponse, TimeSlotUpdateDBRequest,
    },
};
use crate::types::{AppointmentId, GuestId, TimeSlotId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{Connection, PgConnection};
use tracing::instrument;

#[derive(Debug, Clone, Default)]
pub struct TimeSlotFilter {
    pub is_booked: Option<bool>,
    /// Slots starting at or after this instant
    pub starts_after: Option<DateTime<Utc>>,
    pub offset: i64,
    pub limit: i64,
}

const TIME_SLOT_FILTER: &str = r#"
    WHERE ($1::bool IS NULL OR is_booked = $1)
      AND ($2::timestamptz IS NULL OR starts_at >= $2)
"#;

pub struct TimeSlots<'c> {
    db: &'c mut PgConnection,
}

impl<'c> TimeSlots<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Atomically book a free slot. Returns false if the slot is missing or already booked.
    #[instrument(skip(self), fields(time_slot_id = %abbrev_uuid(&id)), err)]
    pub async fn reserve(&mut self, id: TimeSlotId) -> Result<bool> {
        let result = sqlx::query("UPDATE time_slots SET is_booked = TRUE, updated_at = NOW() WHERE id = $1 AND NOT is_booked")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(time_slot_id = %abbrev_uuid(&id)), err)]
    pub async fn release(&mut self, id: TimeSlotId) -> Result<()> {
        sqlx::query("UPDATE time_slots SET is_booked = FALSE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl<'c> Repository for TimeSlots<'c> {
    type CreateRequest = TimeSlotCreateDBRequest;
    type UpdateRequest = TimeSlotUpdateDBRequest;
    type Response = TimeSlotDBResponse;
    type Id = TimeSlotId;
    type Filter = TimeSlotFilter;

    #[instrument(skip(self, request), fields(starts_at = %request.starts_at), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let slot = sqlx::query_as::<_, TimeSlotDBResponse>("INSERT INTO time_slots (starts_at, ends_at) VALUES ($1, $2) RETURNING *")
            .bind(request.starts_at)
            .bind(request.ends_at)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(slot)
    }

    #[instrument(skip(self), fields(time_slot_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let slot = sqlx::query_as::<_, TimeSlotDBResponse>("SELECT * FROM time_slots WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(slot)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, offset = filter.offset), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let sql = format!("SELECT * FROM time_slots {TIME_SLOT_FILTER} ORDER BY starts_at, id LIMIT $3 OFFSET $4");
        let slots = sqlx::query_as::<_, TimeSlotDBResponse>(&sql)
            .bind(filter.is_booked)
            .bind(filter.starts_after)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(slots)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM time_slots {TIME_SLOT_FILTER}");
        let total = sqlx::query_scalar::<_, i64>(&sql)
            .bind(filter.is_booked)
            .bind(filter.starts_after)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(total)
    }

    #[instrument(skip(self), fields(time_slot_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM time_slots WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(time_slot_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let slot = sqlx::query_as::<_, TimeSlotDBResponse>(
            r#"
            UPDATE time_slots SET
                starts_at = COALESCE($2, starts_at),
                ends_at = COALESCE($3, ends_at),
                is_booked = COALESCE($4, is_booked),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.starts_at)
        .bind(request.ends_at)
        .bind(request.is_booked)
        .fetch_optional(&mut *self.db)
        .await?;
        slot.ok_or(DbError::NotFound)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub guest_id: Option<GuestId>,
    pub status: Option<AppointmentStatus>,
    pub offset: i64,
    pub limit: i64,
}

const APPOINTMENT_FILTER: &str = r#"
    WHERE ($1::uuid IS NULL OR guest_id = $1)
      AND ($2::appointment_status IS NULL OR status = $2)
"#;

pub struct Appointments<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Appointments<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Appointments<'c> {
    type CreateRequest = AppointmentCreateDBRequest;
    type UpdateRequest = AppointmentUpdateDBRequest;
    type Response = AppointmentDBResponse;
    type Id = AppointmentId;
    type Filter = AppointmentFilter;

    #[instrument(skip(self, request), fields(guest_id = %abbrev_uuid(&request.guest_id), time_slot_id = %abbrev_uuid(&request.time_slot_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let appointment = sqlx::query_as::<_, AppointmentDBResponse>(
            "INSERT INTO appointments (guest_id, time_slot_id, topic) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(request.guest_id)
        .bind(request.time_slot_id)
        .bind(&request.topic)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(appointment)
    }

    #[instrument(skip(self), fields(appointment_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let appointment = sqlx::query_as::<_, AppointmentDBResponse>("SELECT * FROM appointments WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(appointment)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, offset = filter.offset), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let sql = format!("SELECT * FROM appointments {APPOINTMENT_FILTER} ORDER BY created_at DESC, id LIMIT $3 OFFSET $4");
        let appointments = sqlx::query_as::<_, AppointmentDBResponse>(&sql)
            .bind(filter.guest_id)
            .bind(filter.status)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(appointments)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM appointments {APPOINTMENT_FILTER}");
        let total = sqlx::query_scalar::<_, i64>(&sql)
            .bind(filter.guest_id)
            .bind(filter.status)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(total)
    }

    /// Deletes the appointment and frees its time slot in one transaction.
    #[instrument(skip(self), fields(appointment_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let mut tx = self.db.begin().await?;
        let slot: Option<TimeSlotId> = sqlx::query_scalar("DELETE FROM appointments WHERE id = $1 RETURNING time_slot_id")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(slot) = slot else {
            return Ok(false);
        };
        TimeSlots::new(&mut tx).release(slot).await?;
        tx.commit().await?;
        Ok(true)
    }

    #[instrument(skip(self, request), fields(appointment_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let appointment = sqlx::query_as::<_, AppointmentDBResponse>(
            r#"
            UPDATE appointments SET
                meeting_id = COALESCE($2, meeting_id),
                join_url = COALESCE($3, join_url),
                status = COALESCE($4, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.meeting_id)
        .bind(&request.join_url)
        .bind(request.status)
        .fetch_optional(&mut *self.db)
        .await?;
        appointment.ok_or(DbError::NotFound)
    }
}
