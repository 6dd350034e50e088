//! Database repository for support tickets.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::tickets::{TicketCreateDBRequest, TicketDBResponse, TicketPriority, TicketStatus, TicketUpdateDBRequest},
};
use crate::types::{ProfileId, TicketId, UserId, abbrev_uuid};
use sqlx::PgConnection;
use tracing::instrument;

#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub profile_id: Option<ProfileId>,
    pub user_id: Option<UserId>,
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub offset: i64,
    pub limit: i64,
}

const TICKET_FILTER: &str = r#"
    WHERE ($1::uuid IS NULL OR profile_id = $1)
      AND ($2::uuid IS NULL OR user_id = $2)
      AND ($3::ticket_status IS NULL OR status = $3)
      AND ($4::ticket_priority IS NULL OR priority = $4)
"#;

pub struct Tickets<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Tickets<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Tickets<'c> {
    type CreateRequest = TicketCreateDBRequest;
    type UpdateRequest = TicketUpdateDBRequest;
    type Response = TicketDBResponse;
    type Id = TicketId;
    type Filter = TicketFilter;

    #[instrument(skip(self, request), fields(profile_id = %abbrev_uuid(&request.profile_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let ticket = sqlx::query_as::<_, TicketDBResponse>(
            r#"
            INSERT INTO tickets (profile_id, user_id, subject, description, priority, document_path)
            VALUES ($1, $2, $3, $4, COALESCE($5, 'MEDIUM'::ticket_priority), $6)
            RETURNING *
            "#,
        )
        .bind(request.profile_id)
        .bind(request.user_id)
        .bind(&request.subject)
        .bind(&request.description)
        .bind(request.priority)
        .bind(&request.document_path)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(ticket)
    }

    #[instrument(skip(self), fields(ticket_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let ticket = sqlx::query_as::<_, TicketDBResponse>("SELECT * FROM tickets WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(ticket)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, offset = filter.offset), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let sql = format!("SELECT * FROM tickets {TICKET_FILTER} ORDER BY created_at DESC, id LIMIT $5 OFFSET $6");
        let tickets = sqlx::query_as::<_, TicketDBResponse>(&sql)
            .bind(filter.profile_id)
            .bind(filter.user_id)
            .bind(filter.status)
            .bind(filter.priority)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(tickets)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM tickets {TICKET_FILTER}");
        let total = sqlx::query_scalar::<_, i64>(&sql)
            .bind(filter.profile_id)
            .bind(filter.user_id)
            .bind(filter.status)
            .bind(filter.priority)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(total)
    }

    #[instrument(skip(self), fields(ticket_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tickets WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(ticket_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let ticket = sqlx::query_as::<_, TicketDBResponse>(
            r#"
            UPDATE tickets SET
                subject = COALESCE($2, subject),
                description = COALESCE($3, description),
                status = COALESCE($4, status),
                priority = COALESCE($5, priority),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.subject)
        .bind(&request.description)
        .bind(request.status)
        .bind(request.priority)
        .fetch_optional(&mut *self.db)
        .await?;
        ticket.ok_or(DbError::NotFound)
    }
}
