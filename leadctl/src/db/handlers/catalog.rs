//! Database repositories for the service catalog.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::catalog::{
        CategoryCreateDBRequest, CategoryDBResponse, CategoryUpdateDBRequest, ServiceCreateDBRequest, ServiceDBResponse,
        ServiceUpdateDBRequest,
    },
};
use crate::types::{CategoryId, ServiceId, abbrev_uuid};
use sqlx::{Connection, PgConnection};
use tracing::instrument;

#[derive(Debug, Clone, Default)]
pub struct ServiceFilter {
    pub name: Option<String>,
    pub category_id: Option<CategoryId>,
    pub offset: i64,
    pub limit: i64,
}

const SERVICE_SELECT: &str = r#"
    SELECT s.id, s.name, s.description,
        ARRAY(
            SELECT sc.category_id FROM service_categories sc
            WHERE sc.service_id = s.id ORDER BY sc.category_id
        ) AS category_ids,
        s.created_at, s.updated_at
    FROM services s
"#;

const SERVICE_FILTER: &str = r#"
    WHERE ($1::text IS NULL OR s.name = $1)
      AND ($2::uuid IS NULL OR EXISTS (
            SELECT 1 FROM service_categories sc WHERE sc.service_id = s.id AND sc.category_id = $2))
"#;

async fn fetch_service(conn: &mut PgConnection, id: ServiceId) -> Result<Option<ServiceDBResponse>> {
    let sql = format!("{SERVICE_SELECT} WHERE s.id = $1");
    Ok(sqlx::query_as::<_, ServiceDBResponse>(&sql).bind(id).fetch_optional(conn).await?)
}

/// Replace the category links of a service. Unknown categories fail with a foreign key violation.
async fn link_categories(conn: &mut PgConnection, service_id: ServiceId, category_ids: &[CategoryId]) -> Result<()> {
    sqlx::query("DELETE FROM service_categories WHERE service_id = $1")
        .bind(service_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query(
        "INSERT INTO service_categories (service_id, category_id) SELECT $1, c FROM UNNEST($2::uuid[]) AS c ON CONFLICT DO NOTHING",
    )
    .bind(service_id)
    .bind(category_ids)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub struct Services<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Services<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, category_ids), fields(service_id = %abbrev_uuid(&id), count = category_ids.len()), err)]
    pub async fn set_categories(&mut self, id: ServiceId, category_ids: &[CategoryId]) -> Result<ServiceDBResponse> {
        let mut tx = self.db.begin().await?;
        if fetch_service(&mut tx, id).await?.is_none() {
            return Err(DbError::NotFound);
        }
        link_categories(&mut tx, id, category_ids).await?;
        let service = fetch_service(&mut tx, id).await?.ok_or(DbError::NotFound)?;
        tx.commit().await?;
        Ok(service)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Services<'c> {
    type CreateRequest = ServiceCreateDBRequest;
    type UpdateRequest = ServiceUpdateDBRequest;
    type Response = ServiceDBResponse;
    type Id = ServiceId;
    type Filter = ServiceFilter;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;
        let id: ServiceId = sqlx::query_scalar("INSERT INTO services (name, description) VALUES ($1, $2) RETURNING id")
            .bind(&request.name)
            .bind(&request.description)
            .fetch_one(&mut *tx)
            .await?;
        link_categories(&mut tx, id, &request.category_ids).await?;
        let service = fetch_service(&mut tx, id).await?.ok_or(DbError::NotFound)?;
        tx.commit().await?;
        Ok(service)
    }

    #[instrument(skip(self), fields(service_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        fetch_service(self.db, id).await
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, offset = filter.offset), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let sql = format!("{SERVICE_SELECT} {SERVICE_FILTER} ORDER BY s.name LIMIT $3 OFFSET $4");
        let services = sqlx::query_as::<_, ServiceDBResponse>(&sql)
            .bind(&filter.name)
            .bind(filter.category_id)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(services)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM services s {SERVICE_FILTER}");
        let total = sqlx::query_scalar::<_, i64>(&sql)
            .bind(&filter.name)
            .bind(filter.category_id)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(total)
    }

    #[instrument(skip(self), fields(service_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM services WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(service_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let updated: Option<ServiceId> = sqlx::query_scalar(
            r#"
            UPDATE services SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(&request.description)
        .fetch_optional(&mut *self.db)
        .await?;

        if updated.is_none() {
            return Err(DbError::NotFound);
        }
        fetch_service(self.db, id).await?.ok_or(DbError::NotFound)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CategoryFilter {
    pub name: Option<String>,
    pub offset: i64,
    pub limit: i64,
}

pub struct Categories<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Categories<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Categories<'c> {
    type CreateRequest = CategoryCreateDBRequest;
    type UpdateRequest = CategoryUpdateDBRequest;
    type Response = CategoryDBResponse;
    type Id = CategoryId;
    type Filter = CategoryFilter;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let category = sqlx::query_as::<_, CategoryDBResponse>(
            "INSERT INTO categories (name, description) VALUES ($1, $2) RETURNING *",
        )
        .bind(&request.name)
        .bind(&request.description)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(category)
    }

    #[instrument(skip(self), fields(category_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let category = sqlx::query_as::<_, CategoryDBResponse>("SELECT * FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(category)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, offset = filter.offset), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let categories = sqlx::query_as::<_, CategoryDBResponse>(
            "SELECT * FROM categories WHERE ($1::text IS NULL OR name = $1) ORDER BY name LIMIT $2 OFFSET $3",
        )
        .bind(&filter.name)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(categories)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM categories WHERE ($1::text IS NULL OR name = $1)")
            .bind(&filter.name)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(total)
    }

    #[instrument(skip(self), fields(category_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(category_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let category = sqlx::query_as::<_, CategoryDBResponse>(
            r#"
            UPDATE categories SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(&request.description)
        .fetch_optional(&mut *self.db)
        .await?;
        category.ok_or(DbError::NotFound)
    }
}
