//! Database repository for users.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
};
use crate::types::{UserId, abbrev_uuid};
use sqlx::{Connection, PgConnection};
use tracing::instrument;

/// Filter for listing users
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub email: Option<String>,
    pub role: Option<String>,
    pub is_verified: Option<bool>,
    pub offset: i64,
    pub limit: i64,
}

const USER_SELECT: &str = r#"
    SELECT u.id, u.company_name, u.contact_name, u.email, u.phone, u.password_hash, u.is_verified,
        ARRAY(
            SELECT r.name::text FROM user_roles ur JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = u.id ORDER BY r.name
        ) AS roles,
        u.created_at, u.updated_at
    FROM users u
"#;

const USER_FILTER: &str = r#"
    WHERE ($1::text IS NULL OR u.email = $1)
      AND ($2::text IS NULL OR EXISTS (
            SELECT 1 FROM user_roles ur JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = u.id AND r.name = $2))
      AND ($3::bool IS NULL OR u.is_verified = $3)
"#;

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

async fn fetch_user(conn: &mut PgConnection, id: UserId) -> Result<Option<UserDBResponse>> {
    let sql = format!("{USER_SELECT} WHERE u.id = $1");
    Ok(sqlx::query_as::<_, UserDBResponse>(&sql).bind(id).fetch_optional(conn).await?)
}

/// Replace the user's roles. Every name must exist in `roles`.
async fn assign_roles(conn: &mut PgConnection, user_id: UserId, roles: &[String]) -> Result<()> {
    let mut roles = roles.to_vec();
    roles.sort();
    roles.dedup();

    sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    let inserted = sqlx::query("INSERT INTO user_roles (user_id, role_id) SELECT $1, id FROM roles WHERE name = ANY($2)")
        .bind(user_id)
        .bind(&roles)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    if inserted as usize != roles.len() {
        return Err(DbError::ForeignKeyViolation {
            constraint: None,
            table: Some("user_roles".to_string()),
            message: format!("unknown role in {roles:?}"),
        });
    }
    Ok(())
}

#[async_trait::async_trait]
impl<'c> Repository for Users<'c> {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;
    type Filter = UserFilter;

    #[instrument(skip(self, request), fields(email = %request.email), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;

        let user_id: UserId = sqlx::query_scalar(
            r#"
            INSERT INTO users (company_name, contact_name, email, phone, password_hash, is_verified)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&request.company_name)
        .bind(&request.contact_name)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(&request.password_hash)
        .bind(request.is_verified)
        .fetch_one(&mut *tx)
        .await?;

        assign_roles(&mut tx, user_id, &request.roles).await?;
        let user = fetch_user(&mut tx, user_id).await?.ok_or(DbError::NotFound)?;

        tx.commit().await?;
        Ok(user)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        fetch_user(self.db, id).await
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, offset = filter.offset), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let sql = format!("{USER_SELECT} {USER_FILTER} ORDER BY u.created_at DESC, u.id LIMIT $4 OFFSET $5");
        let users = sqlx::query_as::<_, UserDBResponse>(&sql)
            .bind(&filter.email)
            .bind(&filter.role)
            .bind(filter.is_verified)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(users)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM users u {USER_FILTER}");
        let total = sqlx::query_scalar::<_, i64>(&sql)
            .bind(&filter.email)
            .bind(&filter.role)
            .bind(filter.is_verified)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(total)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let updated: Option<UserId> = sqlx::query_scalar(
            r#"
            UPDATE users SET
                company_name = COALESCE($2, company_name),
                contact_name = COALESCE($3, contact_name),
                phone = COALESCE($4, phone),
                password_hash = COALESCE($5, password_hash),
                is_verified = COALESCE($6, is_verified),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(&request.company_name)
        .bind(&request.contact_name)
        .bind(&request.phone)
        .bind(&request.password_hash)
        .bind(request.is_verified)
        .fetch_optional(&mut *self.db)
        .await?;

        if updated.is_none() {
            return Err(DbError::NotFound);
        }
        fetch_user(self.db, id).await?.ok_or(DbError::NotFound)
    }
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, email), err)]
    pub async fn get_user_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        let sql = format!("{USER_SELECT} WHERE u.email = $1");
        Ok(sqlx::query_as::<_, UserDBResponse>(&sql)
            .bind(email)
            .fetch_optional(&mut *self.db)
            .await?)
    }

    /// Replace all roles of a user in one transaction.
    #[instrument(skip(self, roles), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn set_roles(&mut self, id: UserId, roles: &[String]) -> Result<UserDBResponse> {
        let mut tx = self.db.begin().await?;
        if fetch_user(&mut tx, id).await?.is_none() {
            return Err(DbError::NotFound);
        }
        assign_roles(&mut tx, id, roles).await?;
        let user = fetch_user(&mut tx, id).await?.ok_or(DbError::NotFound)?;
        tx.commit().await?;
        Ok(user)
    }
}

#[cfg(all(test, feature = "live-db-tests"))]
mod tests {
    use super::*;
    use crate::api::models::roles::{ADMIN, USER};
    use crate::test_utils::seed_roles;
    use sqlx::PgPool;

    fn request(email: &str, roles: &[&str]) -> UserCreateDBRequest {
        UserCreateDBRequest {
            company_name: "Acme".to_string(),
            contact_name: "Ada".to_string(),
            email: email.to_string(),
            phone: None,
            password_hash: "hash".to_string(),
            is_verified: false,
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_and_get_by_email(pool: PgPool) {
        seed_roles(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let created = repo.create(&request("ada@example.com", &[USER, ADMIN])).await.unwrap();
        assert_eq!(created.roles, vec![ADMIN.to_string(), USER.to_string()]);
        assert!(!created.is_verified);

        let found = repo.get_user_by_email("ada@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_email_is_unique_violation(pool: PgPool) {
        seed_roles(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        repo.create(&request("dup@example.com", &[USER])).await.unwrap();
        let err = repo.create(&request("dup@example.com", &[USER])).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        let filter = UserFilter {
            email: Some("dup@example.com".to_string()),
            limit: 10,
            ..Default::default()
        };
        assert_eq!(repo.count(&filter).await.unwrap(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unknown_role_rolls_back(pool: PgPool) {
        seed_roles(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let err = repo.create(&request("ghost@example.com", &["WIZARD"])).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
        assert!(repo.get_user_by_email("ghost@example.com").await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_partial_update_keeps_other_fields(pool: PgPool) {
        seed_roles(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let created = repo.create(&request("upd@example.com", &[USER])).await.unwrap();
        let updated = repo
            .update(
                created.id,
                &UserUpdateDBRequest {
                    phone: Some("+44 20 7946 0000".to_string()),
                    is_verified: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.phone.as_deref(), Some("+44 20 7946 0000"));
        assert!(updated.is_verified);
        assert_eq!(updated.company_name, "Acme");
        assert_eq!(updated.roles, vec![USER.to_string()]);

        let missing = repo.update(uuid::Uuid::new_v4(), &UserUpdateDBRequest::default()).await;
        assert!(matches!(missing, Err(DbError::NotFound)));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_filters_by_role_and_pages(pool: PgPool) {
        seed_roles(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        for i in 0..3 {
            repo.create(&request(&format!("user{i}@example.com"), &[USER])).await.unwrap();
        }
        repo.create(&request("boss@example.com", &[ADMIN])).await.unwrap();

        let admins = UserFilter {
            role: Some(ADMIN.to_string()),
            limit: 10,
            ..Default::default()
        };
        assert_eq!(repo.count(&admins).await.unwrap(), 1);

        let second_page = UserFilter {
            limit: 2,
            offset: 2,
            ..Default::default()
        };
        assert_eq!(repo.list(&second_page).await.unwrap().len(), 2);
        assert_eq!(repo.count(&second_page).await.unwrap(), 4);

        let past_end = UserFilter {
            limit: 10,
            offset: 50,
            ..Default::default()
        };
        assert!(repo.list(&past_end).await.unwrap().is_empty());
    }
}
