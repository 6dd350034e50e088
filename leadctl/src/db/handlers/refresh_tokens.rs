//! Database repository for refresh tokens.

use crate::db::{
    errors::Result,
    models::refresh_tokens::{RefreshTokenCreateDBRequest, RefreshTokenDBResponse},
};
use crate::types::{UserId, abbrev_uuid};
use sqlx::PgConnection;
use tracing::instrument;

pub struct RefreshTokens<'c> {
    db: &'c mut PgConnection,
}

impl<'c> RefreshTokens<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id)), err)]
    pub async fn create(&mut self, request: &RefreshTokenCreateDBRequest) -> Result<RefreshTokenDBResponse> {
        let token = sqlx::query_as::<_, RefreshTokenDBResponse>(
            "INSERT INTO refresh_tokens (user_id, token_hash, expires_at) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(request.user_id)
        .bind(&request.token_hash)
        .bind(request.expires_at)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(token)
    }

    #[instrument(skip_all, err)]
    pub async fn find_by_hash(&mut self, token_hash: &str) -> Result<Option<RefreshTokenDBResponse>> {
        let token = sqlx::query_as::<_, RefreshTokenDBResponse>("SELECT * FROM refresh_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(token)
    }

    /// Returns whether a row was removed
    #[instrument(skip_all, err)]
    pub async fn delete_by_hash(&mut self, token_hash: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn delete_for_user(&mut self, user_id: UserId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self), err)]
    pub async fn delete_expired(&mut self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= NOW()")
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(all(test, feature = "live-db-tests"))]
mod tests {
    use super::*;
    use crate::test_utils::create_test_user;
    use chrono::{Duration, Utc};
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_find_and_delete_by_hash(pool: PgPool) {
        let user = create_test_user(&pool, "USER").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = RefreshTokens::new(&mut conn);

        repo.create(&RefreshTokenCreateDBRequest {
            user_id: user.id,
            token_hash: "a".repeat(64),
            expires_at: Utc::now() + Duration::days(1),
        })
        .await
        .unwrap();

        let found = repo.find_by_hash(&"a".repeat(64)).await.unwrap().unwrap();
        assert_eq!(found.user_id, user.id);
        assert!(!found.is_expired());

        assert!(repo.delete_by_hash(&"a".repeat(64)).await.unwrap());
        assert!(repo.find_by_hash(&"a".repeat(64)).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_expired_keeps_live_tokens(pool: PgPool) {
        let user = create_test_user(&pool, "USER").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = RefreshTokens::new(&mut conn);

        for (hash, offset) in [("b", -1), ("c", 1)] {
            repo.create(&RefreshTokenCreateDBRequest {
                user_id: user.id,
                token_hash: hash.repeat(64),
                expires_at: Utc::now() + Duration::hours(offset),
            })
            .await
            .unwrap();
        }

        assert_eq!(repo.delete_expired().await.unwrap(), 1);
        assert!(repo.find_by_hash(&"c".repeat(64)).await.unwrap().is_some());
    }
}
