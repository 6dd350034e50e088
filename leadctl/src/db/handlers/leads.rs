//! Database repository for leads.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::leads::{LeadCreateDBRequest, LeadDBResponse, LeadStatus, LeadUpdateDBRequest},
};
use crate::types::{PipelineId, ProfileId, abbrev_uuid};
use sqlx::PgConnection;
use tracing::instrument;

#[derive(Debug, Clone, Default)]
pub struct LeadFilter {
    pub profile_id: Option<ProfileId>,
    pub status: Option<LeadStatus>,
    pub external_id: Option<String>,
    pub offset: i64,
    pub limit: i64,
}

const LEAD_FILTER: &str = r#"
    WHERE ($1::uuid IS NULL OR profile_id = $1)
      AND ($2::lead_status IS NULL OR status = $2)
      AND ($3::text IS NULL OR external_id = $3)
"#;

pub struct Leads<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Leads<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(lead_id = %abbrev_uuid(&id)), err)]
    pub async fn get_for_update(&mut self, id: PipelineId) -> Result<Option<LeadDBResponse>> {
        let lead = sqlx::query_as::<_, LeadDBResponse>("SELECT * FROM leads WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(lead)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Leads<'c> {
    type CreateRequest = LeadCreateDBRequest;
    type UpdateRequest = LeadUpdateDBRequest;
    type Response = LeadDBResponse;
    type Id = PipelineId;
    type Filter = LeadFilter;

    #[instrument(skip(self, request), fields(profile_id = %abbrev_uuid(&request.profile_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let lead = sqlx::query_as::<_, LeadDBResponse>(
            r#"
            INSERT INTO leads (id, profile_id, external_id, record, status, comment)
            VALUES (COALESCE($1, gen_random_uuid()), $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(request.id)
        .bind(request.profile_id)
        .bind(&request.external_id)
        .bind(&request.record)
        .bind(request.status)
        .bind(&request.comment)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(lead)
    }

    #[instrument(skip(self), fields(lead_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let lead = sqlx::query_as::<_, LeadDBResponse>("SELECT * FROM leads WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(lead)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, offset = filter.offset), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let sql = format!("SELECT * FROM leads {LEAD_FILTER} ORDER BY created_at DESC, id LIMIT $4 OFFSET $5");
        let leads = sqlx::query_as::<_, LeadDBResponse>(&sql)
            .bind(filter.profile_id)
            .bind(filter.status)
            .bind(&filter.external_id)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(leads)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM leads {LEAD_FILTER}");
        let total = sqlx::query_scalar::<_, i64>(&sql)
            .bind(filter.profile_id)
            .bind(filter.status)
            .bind(&filter.external_id)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(total)
    }

    #[instrument(skip(self), fields(lead_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM leads WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// In-place update. A `SALE_MADE` status trips `leads_status_not_sale`; use
    /// [`crate::db::handlers::Pipeline`] to move the row instead.
    #[instrument(skip(self, request), fields(lead_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let lead = sqlx::query_as::<_, LeadDBResponse>(
            r#"
            UPDATE leads SET
                status = COALESCE($2, status),
                comment = COALESCE($3, comment),
                record = COALESCE($4, record),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.status)
        .bind(&request.comment)
        .bind(&request.record)
        .fetch_optional(&mut *self.db)
        .await?;
        lead.ok_or(DbError::NotFound)
    }
}

#[cfg(all(test, feature = "live-db-tests"))]
mod tests {
    use super::*;
    use crate::test_utils::create_test_profile;
    use serde_json::json;
    use sqlx::PgPool;

    fn lead(profile_id: ProfileId, external_id: &str) -> LeadCreateDBRequest {
        LeadCreateDBRequest {
            id: None,
            profile_id,
            external_id: Some(external_id.to_string()),
            record: json!({"ID": external_id, "Company": "Initech"}),
            status: LeadStatus::Lead,
            comment: None,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_external_id_unique_per_profile(pool: PgPool) {
        let profile = create_test_profile(&pool).await;
        let other = create_test_profile(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Leads::new(&mut conn);

        repo.create(&lead(profile.id, "row-1")).await.unwrap();
        let dup = repo.create(&lead(profile.id, "row-1")).await;
        assert!(matches!(dup, Err(DbError::UniqueViolation { .. })));
        repo.create(&lead(other.id, "row-1")).await.unwrap();

        let filter = LeadFilter {
            profile_id: Some(profile.id),
            limit: 10,
            ..Default::default()
        };
        assert_eq!(repo.count(&filter).await.unwrap(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_sale_made_cannot_be_stored_in_place(pool: PgPool) {
        let profile = create_test_profile(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Leads::new(&mut conn);
        let created = repo.create(&lead(profile.id, "row-2")).await.unwrap();

        let result = repo
            .update(
                created.id,
                &LeadUpdateDBRequest {
                    status: Some(LeadStatus::SaleMade),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(DbError::CheckViolation { .. })));

        let updated = repo
            .update(
                created.id,
                &LeadUpdateDBRequest {
                    status: Some(LeadStatus::FollowUp),
                    comment: Some("call back Tuesday".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, LeadStatus::FollowUp);
        assert_eq!(updated.record["Company"], "Initech");
    }
}
