//! Database repository for guest requests.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::guest_requests::{GuestRequestCreateDBRequest, GuestRequestDBResponse, GuestRequestUpdateDBRequest, RequestStatus},
};
use crate::types::{GuestId, GuestRequestId, ServiceId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::instrument;

#[derive(Debug, Clone, Default)]
pub struct GuestRequestFilter {
    pub guest_id: Option<GuestId>,
    pub service_id: Option<ServiceId>,
    pub status: Option<RequestStatus>,
    pub offset: i64,
    pub limit: i64,
}

const GUEST_REQUEST_FILTER: &str = r#"
    WHERE ($1::uuid IS NULL OR guest_id = $1)
      AND ($2::uuid IS NULL OR service_id = $2)
      AND ($3::request_status IS NULL OR status = $3)
"#;

pub struct GuestRequests<'c> {
    db: &'c mut PgConnection,
}

impl<'c> GuestRequests<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Lock the request row for the rest of the surrounding transaction.
    #[instrument(skip(self), fields(request_id = %abbrev_uuid(&id)), err)]
    pub async fn get_for_update(&mut self, id: GuestRequestId) -> Result<Option<GuestRequestDBResponse>> {
        let request = sqlx::query_as::<_, GuestRequestDBResponse>("SELECT * FROM guest_requests WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(request)
    }

    /// Resolve a pending request. Returns false when it was not pending.
    #[instrument(skip(self), fields(request_id = %abbrev_uuid(&id)), err)]
    pub async fn resolve(&mut self, id: GuestRequestId) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE guest_requests SET status = 'RESOLVED', resolved_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(id)
        .execute(&mut *self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete pending requests created before `cutoff`.
    #[instrument(skip(self), err)]
    pub async fn purge_pending_before(&mut self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM guest_requests WHERE status = 'PENDING' AND created_at < $1")
            .bind(cutoff)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl<'c> Repository for GuestRequests<'c> {
    type CreateRequest = GuestRequestCreateDBRequest;
    type UpdateRequest = GuestRequestUpdateDBRequest;
    type Response = GuestRequestDBResponse;
    type Id = GuestRequestId;
    type Filter = GuestRequestFilter;

    #[instrument(skip(self, request), fields(guest_id = %abbrev_uuid(&request.guest_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let created = sqlx::query_as::<_, GuestRequestDBResponse>(
            "INSERT INTO guest_requests (guest_id, service_id, category_id) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(request.guest_id)
        .bind(request.service_id)
        .bind(request.category_id)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(created)
    }

    #[instrument(skip(self), fields(request_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let request = sqlx::query_as::<_, GuestRequestDBResponse>("SELECT * FROM guest_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(request)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, offset = filter.offset), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let sql = format!("SELECT * FROM guest_requests {GUEST_REQUEST_FILTER} ORDER BY created_at DESC, id LIMIT $4 OFFSET $5");
        let requests = sqlx::query_as::<_, GuestRequestDBResponse>(&sql)
            .bind(filter.guest_id)
            .bind(filter.service_id)
            .bind(filter.status)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(requests)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM guest_requests {GUEST_REQUEST_FILTER}");
        let total = sqlx::query_scalar::<_, i64>(&sql)
            .bind(filter.guest_id)
            .bind(filter.service_id)
            .bind(filter.status)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(total)
    }

    #[instrument(skip(self), fields(request_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM guest_requests WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(request_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let updated = sqlx::query_as::<_, GuestRequestDBResponse>(
            r#"
            UPDATE guest_requests SET
                service_id = COALESCE($2, service_id),
                category_id = COALESCE($3, category_id),
                status = COALESCE($4, status),
                resolved_at = CASE
                    WHEN COALESCE($4, status) = 'RESOLVED' THEN COALESCE(resolved_at, NOW())
                    ELSE NULL
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.service_id)
        .bind(request.category_id)
        .bind(request.status)
        .fetch_optional(&mut *self.db)
        .await?;
        updated.ok_or(DbError::NotFound)
    }
}

#[cfg(all(test, feature = "live-db-tests"))]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_guest, create_test_service};
    use chrono::Duration;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_resolve_only_pending(pool: PgPool) {
        let guest = create_test_guest(&pool).await;
        let service = create_test_service(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = GuestRequests::new(&mut conn);

        let request = repo
            .create(&GuestRequestCreateDBRequest {
                guest_id: guest.id,
                service_id: service.id,
                category_id: None,
            })
            .await
            .unwrap();
        assert_eq!(request.status, RequestStatus::Pending);
        assert!(request.resolved_at.is_none());

        assert!(repo.resolve(request.id).await.unwrap());
        assert!(!repo.resolve(request.id).await.unwrap());

        let resolved = repo.get_by_id(request.id).await.unwrap().unwrap();
        assert_eq!(resolved.status, RequestStatus::Resolved);
        assert!(resolved.resolved_at.is_some());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_missing_parent_is_foreign_key_violation(pool: PgPool) {
        let guest = create_test_guest(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let result = GuestRequests::new(&mut conn)
            .create(&GuestRequestCreateDBRequest {
                guest_id: guest.id,
                service_id: uuid::Uuid::new_v4(),
                category_id: None,
            })
            .await;
        assert!(matches!(result, Err(DbError::ForeignKeyViolation { .. })));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_purge_removes_only_stale_pending(pool: PgPool) {
        let guest = create_test_guest(&pool).await;
        let service = create_test_service(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = GuestRequests::new(&mut conn);

        let mut ids = Vec::new();
        for _ in 0..3 {
            let created = repo
                .create(&GuestRequestCreateDBRequest {
                    guest_id: guest.id,
                    service_id: service.id,
                    category_id: None,
                })
                .await
                .unwrap();
            ids.push(created.id);
        }

        // Two old requests, one of them resolved
        sqlx::query("UPDATE guest_requests SET created_at = NOW() - INTERVAL '45 days' WHERE id = ANY($1)")
            .bind(&ids[..2])
            .execute(&pool)
            .await
            .unwrap();
        repo.resolve(ids[1]).await.unwrap();

        let purged = repo.purge_pending_before(Utc::now() - Duration::days(30)).await.unwrap();
        assert_eq!(purged, 1);

        let filter = GuestRequestFilter { limit: 10, ..Default::default() };
        assert_eq!(repo.count(&filter).await.unwrap(), 2);
    }
}
