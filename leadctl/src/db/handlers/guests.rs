//! Database repository for guests.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::guests::{GuestCreateDBRequest, GuestDBResponse, GuestUpdateDBRequest},
};
use crate::types::{GuestId, abbrev_uuid};
use sqlx::{Connection, PgConnection};
use tracing::{debug, instrument};

#[derive(Debug, Clone, Default)]
pub struct GuestFilter {
    pub email: Option<String>,
    pub approved: Option<bool>,
    pub offset: i64,
    pub limit: i64,
}

const GUEST_FILTER: &str = r#"
    WHERE ($1::text IS NULL OR email = $1)
      AND ($2::bool IS NULL OR approved = $2)
"#;

pub struct Guests<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Guests<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, email), err)]
    pub async fn get_by_email(&mut self, email: &str) -> Result<Option<GuestDBResponse>> {
        let guest = sqlx::query_as::<_, GuestDBResponse>("SELECT * FROM guests WHERE email = $1")
            .bind(email)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(guest)
    }

    /// Lock the guest row for the rest of the surrounding transaction.
    #[instrument(skip(self), fields(guest_id = %abbrev_uuid(&id)), err)]
    pub async fn get_for_update(&mut self, id: GuestId) -> Result<Option<GuestDBResponse>> {
        let guest = sqlx::query_as::<_, GuestDBResponse>("SELECT * FROM guests WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(guest)
    }

    /// Flip `approved` once. Returns false when the guest was already approved.
    #[instrument(skip(self), fields(guest_id = %abbrev_uuid(&id)), err)]
    pub async fn mark_approved(&mut self, id: GuestId) -> Result<bool> {
        let result = sqlx::query("UPDATE guests SET approved = TRUE, updated_at = NOW() WHERE id = $1 AND NOT approved")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Guests<'c> {
    type CreateRequest = GuestCreateDBRequest;
    type UpdateRequest = GuestUpdateDBRequest;
    type Response = GuestDBResponse;
    type Id = GuestId;
    type Filter = GuestFilter;

    #[instrument(skip(self, request), fields(email = %request.email), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let guest = sqlx::query_as::<_, GuestDBResponse>(
            r#"
            INSERT INTO guests (company_name, contact_name, email, phone, message)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&request.company_name)
        .bind(&request.contact_name)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(&request.message)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(guest)
    }

    #[instrument(skip(self), fields(guest_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let guest = sqlx::query_as::<_, GuestDBResponse>("SELECT * FROM guests WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(guest)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, offset = filter.offset), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let sql = format!("SELECT * FROM guests {GUEST_FILTER} ORDER BY created_at DESC, id LIMIT $3 OFFSET $4");
        let guests = sqlx::query_as::<_, GuestDBResponse>(&sql)
            .bind(&filter.email)
            .bind(filter.approved)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(guests)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM guests {GUEST_FILTER}");
        let total = sqlx::query_scalar::<_, i64>(&sql)
            .bind(&filter.email)
            .bind(filter.approved)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(total)
    }

    /// Deletes the guest with its requests and appointments. Slots held by those
    /// appointments are freed in the same transaction.
    #[instrument(skip(self), fields(guest_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let mut tx = self.db.begin().await?;
        let freed = sqlx::query(
            r#"
            UPDATE time_slots SET is_booked = FALSE, updated_at = NOW()
            WHERE id IN (SELECT time_slot_id FROM appointments WHERE guest_id = $1)
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        let result = sqlx::query("DELETE FROM guests WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }
        tx.commit().await?;
        debug!(freed_slots = freed.rows_affected(), "Guest deleted");
        Ok(true)
    }

    #[instrument(skip(self, request), fields(guest_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let guest = sqlx::query_as::<_, GuestDBResponse>(
            r#"
            UPDATE guests SET
                company_name = COALESCE($2, company_name),
                contact_name = COALESCE($3, contact_name),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                message = COALESCE($6, message),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.company_name)
        .bind(&request.contact_name)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(&request.message)
        .fetch_optional(&mut *self.db)
        .await?;
        guest.ok_or(DbError::NotFound)
    }
}
