//! Database repository for roles.

use crate::api::models::roles::{SYSTEM_ROLES, is_system_role};
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::roles::{RoleCreateDBRequest, RoleDBResponse, RoleUpdateDBRequest},
};
use crate::types::{Operation, RoleId, abbrev_uuid};
use sqlx::{Connection, PgConnection};
use tracing::instrument;

#[derive(Debug, Clone, Default)]
pub struct RoleFilter {
    pub offset: i64,
    pub limit: i64,
}

pub struct Roles<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Roles<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Insert the system roles if they are missing. Safe to run on every start.
    #[instrument(skip(self), err)]
    pub async fn seed_system_roles(&mut self) -> Result<()> {
        let mut tx = self.db.begin().await?;
        for (name, description) in SYSTEM_ROLES {
            sqlx::query("INSERT INTO roles (name, description) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING")
                .bind(name)
                .bind(description)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    fn protect(operation: Operation, role: &RoleDBResponse) -> Result<()> {
        if is_system_role(&role.name) {
            return Err(DbError::ProtectedEntity {
                operation,
                reason: format!("{} is a system role", role.name),
                entity_type: "Role".to_string(),
                entity_id: Some(role.id.to_string()),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Roles<'c> {
    type CreateRequest = RoleCreateDBRequest;
    type UpdateRequest = RoleUpdateDBRequest;
    type Response = RoleDBResponse;
    type Id = RoleId;
    type Filter = RoleFilter;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let role = sqlx::query_as::<_, RoleDBResponse>(
            "INSERT INTO roles (name, description) VALUES ($1, $2) RETURNING *",
        )
        .bind(&request.name)
        .bind(&request.description)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(role)
    }

    #[instrument(skip(self), fields(role_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let role = sqlx::query_as::<_, RoleDBResponse>("SELECT * FROM roles WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(role)
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let roles = sqlx::query_as::<_, RoleDBResponse>("SELECT * FROM roles ORDER BY name LIMIT $1 OFFSET $2")
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(roles)
    }

    #[instrument(skip(self, _filter), err)]
    async fn count(&mut self, _filter: &Self::Filter) -> Result<i64> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM roles")
            .fetch_one(&mut *self.db)
            .await?;
        Ok(total)
    }

    #[instrument(skip(self), fields(role_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let Some(role) = self.get_by_id(id).await? else {
            return Ok(false);
        };
        Self::protect(Operation::DeleteAll, &role)?;

        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(role_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let role = self.get_by_id(id).await?.ok_or(DbError::NotFound)?;
        if request.name.as_deref().is_some_and(|name| name != role.name) {
            Self::protect(Operation::UpdateAll, &role)?;
        }

        let role = sqlx::query_as::<_, RoleDBResponse>(
            r#"
            UPDATE roles SET
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
        .fetch_one(&mut *self.db)
        .await?;
        Ok(role)
    }
}

#[cfg(all(test, feature = "live-db-tests"))]
mod tests {
    use super::*;
    use crate::api::models::roles::ADMIN;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_seed_is_idempotent(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Roles::new(&mut conn);

        repo.seed_system_roles().await.unwrap();
        repo.seed_system_roles().await.unwrap();

        let filter = RoleFilter { limit: 10, offset: 0 };
        assert_eq!(repo.count(&filter).await.unwrap(), SYSTEM_ROLES.len() as i64);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_system_roles_are_protected(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Roles::new(&mut conn);
        repo.seed_system_roles().await.unwrap();

        let roles = repo.list(&RoleFilter { limit: 10, offset: 0 }).await.unwrap();
        let admin = roles.iter().find(|r| r.name == ADMIN).unwrap();

        let err = repo.delete(admin.id).await.unwrap_err();
        assert!(matches!(err, DbError::ProtectedEntity { .. }));

        let rename = RoleUpdateDBRequest {
            name: Some("BOSS".to_string()),
            ..Default::default()
        };
        assert!(matches!(repo.update(admin.id, &rename).await, Err(DbError::ProtectedEntity { .. })));

        let describe = RoleUpdateDBRequest {
            description: Some("Runs the shop".to_string()),
            ..Default::default()
        };
        let updated = repo.update(admin.id, &describe).await.unwrap();
        assert_eq!(updated.description.as_deref(), Some("Runs the shop"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_custom_role_lifecycle(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Roles::new(&mut conn);

        let request = RoleCreateDBRequest {
            name: "SALES_MANAGER".to_string(),
            description: None,
        };
        let role = repo.create(&request).await.unwrap();
        assert!(matches!(repo.create(&request).await, Err(DbError::UniqueViolation { .. })));

        assert!(repo.delete(role.id).await.unwrap());
        assert!(!repo.delete(role.id).await.unwrap());
    }
}
