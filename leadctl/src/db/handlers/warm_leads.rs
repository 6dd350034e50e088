//! Database repository for warm leads.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::warm_leads::{WarmLeadCreateDBRequest, WarmLeadDBResponse, WarmLeadStatus, WarmLeadUpdateDBRequest},
};
use crate::types::{ProfileId, WarmLeadId, abbrev_uuid};
use sqlx::PgConnection;
use tracing::instrument;

#[derive(Debug, Clone, Default)]
pub struct WarmLeadFilter {
    pub profile_id: Option<ProfileId>,
    pub status: Option<WarmLeadStatus>,
    pub email: Option<String>,
    pub offset: i64,
    pub limit: i64,
}

const WARM_LEAD_FILTER: &str = r#"
    WHERE ($1::uuid IS NULL OR profile_id = $1)
      AND ($2::warm_lead_status IS NULL OR status = $2)
      AND ($3::text IS NULL OR email = $3)
"#;

pub struct WarmLeads<'c> {
    db: &'c mut PgConnection,
}

impl<'c> WarmLeads<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for WarmLeads<'c> {
    type CreateRequest = WarmLeadCreateDBRequest;
    type UpdateRequest = WarmLeadUpdateDBRequest;
    type Response = WarmLeadDBResponse;
    type Id = WarmLeadId;
    type Filter = WarmLeadFilter;

    #[instrument(skip(self, request), fields(profile_id = %abbrev_uuid(&request.profile_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let warm_lead = sqlx::query_as::<_, WarmLeadDBResponse>(
            r#"
            INSERT INTO warm_leads (profile_id, company_name, contact_name, email, phone, notes, status)
            VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, 'NEW'::warm_lead_status))
            RETURNING *
            "#,
        )
        .bind(request.profile_id)
        .bind(&request.company_name)
        .bind(&request.contact_name)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(&request.notes)
        .bind(request.status)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(warm_lead)
    }

    #[instrument(skip(self), fields(warm_lead_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let warm_lead = sqlx::query_as::<_, WarmLeadDBResponse>("SELECT * FROM warm_leads WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(warm_lead)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, offset = filter.offset), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let sql = format!("SELECT * FROM warm_leads {WARM_LEAD_FILTER} ORDER BY created_at DESC, id LIMIT $4 OFFSET $5");
        let warm_leads = sqlx::query_as::<_, WarmLeadDBResponse>(&sql)
            .bind(filter.profile_id)
            .bind(filter.status)
            .bind(&filter.email)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(warm_leads)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM warm_leads {WARM_LEAD_FILTER}");
        let total = sqlx::query_scalar::<_, i64>(&sql)
            .bind(filter.profile_id)
            .bind(filter.status)
            .bind(&filter.email)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(total)
    }

    #[instrument(skip(self), fields(warm_lead_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM warm_leads WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(warm_lead_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let warm_lead = sqlx::query_as::<_, WarmLeadDBResponse>(
            r#"
            UPDATE warm_leads SET
                company_name = COALESCE($2, company_name),
                contact_name = COALESCE($3, contact_name),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                notes = COALESCE($6, notes),
                status = COALESCE($7, status),
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
        .bind(&request.notes)
        .bind(request.status)
        .fetch_optional(&mut *self.db)
        .await?;
        warm_lead.ok_or(DbError::NotFound)
    }
}
