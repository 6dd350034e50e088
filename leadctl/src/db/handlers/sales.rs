//! Database repository for sales.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::sales::{SaleCreateDBRequest, SaleDBResponse, SaleStage, SaleUpdateDBRequest},
};
use crate::types::{PipelineId, ProfileId, abbrev_uuid};
use sqlx::PgConnection;
use tracing::instrument;

#[derive(Debug, Clone, Default)]
pub struct SaleFilter {
    pub profile_id: Option<ProfileId>,
    pub stage: Option<SaleStage>,
    pub offset: i64,
    pub limit: i64,
}

const SALE_FILTER: &str = r#"
    WHERE ($1::uuid IS NULL OR profile_id = $1)
      AND ($2::sale_stage IS NULL OR stage = $2)
"#;

pub struct Sales<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Sales<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(sale_id = %abbrev_uuid(&id)), err)]
    pub async fn get_for_update(&mut self, id: PipelineId) -> Result<Option<SaleDBResponse>> {
        let sale = sqlx::query_as::<_, SaleDBResponse>("SELECT * FROM sales WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(sale)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Sales<'c> {
    type CreateRequest = SaleCreateDBRequest;
    type UpdateRequest = SaleUpdateDBRequest;
    type Response = SaleDBResponse;
    type Id = PipelineId;
    type Filter = SaleFilter;

    #[instrument(skip(self, request), fields(sale_id = %abbrev_uuid(&request.id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let sale = sqlx::query_as::<_, SaleDBResponse>(
            r#"
            INSERT INTO sales (id, profile_id, external_id, record, stage, deal_value, deal_currency, comment)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(request.id)
        .bind(request.profile_id)
        .bind(&request.external_id)
        .bind(&request.record)
        .bind(request.stage)
        .bind(request.deal_value)
        .bind(&request.deal_currency)
        .bind(&request.comment)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(sale)
    }

    #[instrument(skip(self), fields(sale_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let sale = sqlx::query_as::<_, SaleDBResponse>("SELECT * FROM sales WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(sale)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, offset = filter.offset), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let sql = format!("SELECT * FROM sales {SALE_FILTER} ORDER BY created_at DESC, id LIMIT $3 OFFSET $4");
        let sales = sqlx::query_as::<_, SaleDBResponse>(&sql)
            .bind(filter.profile_id)
            .bind(filter.stage)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(sales)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM sales {SALE_FILTER}");
        let total = sqlx::query_scalar::<_, i64>(&sql)
            .bind(filter.profile_id)
            .bind(filter.stage)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(total)
    }

    #[instrument(skip(self), fields(sale_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sales WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(sale_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let sale = sqlx::query_as::<_, SaleDBResponse>(
            r#"
            UPDATE sales SET
                stage = COALESCE($2, stage),
                deal_value = COALESCE($3, deal_value),
                deal_currency = COALESCE($4, deal_currency),
                comment = COALESCE($5, comment),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.stage)
        .bind(request.deal_value)
        .bind(&request.deal_currency)
        .bind(&request.comment)
        .fetch_optional(&mut *self.db)
        .await?;
        sale.ok_or(DbError::NotFound)
    }
}
