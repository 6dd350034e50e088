//! Database repository for profiles and the `user_profiles` membership join.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::profiles::{ProfileCreateDBRequest, ProfileDBResponse, ProfileUpdateDBRequest},
};
use crate::types::{ProfileId, ServiceId, UserId, abbrev_uuid};
use sqlx::PgConnection;
use tracing::instrument;

#[derive(Debug, Clone, Default)]
pub struct ProfileFilter {
    /// Profiles this user owns or is a member of
    pub accessible_by: Option<UserId>,
    pub service_id: Option<ServiceId>,
    pub offset: i64,
    pub limit: i64,
}

const PROFILE_FILTER: &str = r#"
    WHERE ($1::uuid IS NULL OR p.user_id = $1 OR EXISTS (
            SELECT 1 FROM user_profiles up WHERE up.profile_id = p.id AND up.user_id = $1))
      AND ($2::uuid IS NULL OR p.service_id = $2)
"#;

pub struct Profiles<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Profiles<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Add a membership row. Returns false when the user was already a member.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id), profile_id = %abbrev_uuid(&profile_id)), err)]
    pub async fn add_member(&mut self, user_id: UserId, profile_id: ProfileId) -> Result<bool> {
        let result = sqlx::query("INSERT INTO user_profiles (user_id, profile_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(user_id)
            .bind(profile_id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Owner or member of the profile
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id), profile_id = %abbrev_uuid(&profile_id)), err)]
    pub async fn has_access(&mut self, user_id: UserId, profile_id: ProfileId) -> Result<bool> {
        let allowed = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (SELECT 1 FROM profiles WHERE id = $2 AND user_id = $1)
                OR EXISTS (SELECT 1 FROM user_profiles WHERE profile_id = $2 AND user_id = $1)
            "#,
        )
        .bind(user_id)
        .bind(profile_id)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(allowed)
    }

    /// The oldest profile `user_id` owns for `service_id`, if any.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id), service_id = %abbrev_uuid(&service_id)), err)]
    pub async fn find_owned_for_service(&mut self, user_id: UserId, service_id: ServiceId) -> Result<Option<ProfileDBResponse>> {
        let profile = sqlx::query_as::<_, ProfileDBResponse>(
            "SELECT * FROM profiles WHERE user_id = $1 AND service_id = $2 ORDER BY created_at, id LIMIT 1",
        )
        .bind(user_id)
        .bind(service_id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(profile)
    }

    /// Every profile bound to a spreadsheet, oldest sync first.
    #[instrument(skip(self), err)]
    pub async fn list_with_sheets(&mut self) -> Result<Vec<ProfileDBResponse>> {
        let profiles = sqlx::query_as::<_, ProfileDBResponse>(
            r#"
            SELECT * FROM profiles
            WHERE sheet_url IS NOT NULL AND sheet_url <> ''
              AND sheet_name IS NOT NULL AND sheet_name <> ''
            ORDER BY last_synced_at ASC NULLS FIRST, id
            "#,
        )
        .fetch_all(&mut *self.db)
        .await?;
        Ok(profiles)
    }

    #[instrument(skip(self), fields(profile_id = %abbrev_uuid(&id)), err)]
    pub async fn mark_synced(&mut self, id: ProfileId) -> Result<()> {
        sqlx::query("UPDATE profiles SET last_synced_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Profiles<'c> {
    type CreateRequest = ProfileCreateDBRequest;
    type UpdateRequest = ProfileUpdateDBRequest;
    type Response = ProfileDBResponse;
    type Id = ProfileId;
    type Filter = ProfileFilter;

    /// Inserts the profile row only; memberships go through [`Profiles::add_member`].
    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id), name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let profile = sqlx::query_as::<_, ProfileDBResponse>(
            r#"
            INSERT INTO profiles (user_id, service_id, name, sheet_url, sheet_name)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(request.user_id)
        .bind(request.service_id)
        .bind(&request.name)
        .bind(&request.sheet_url)
        .bind(&request.sheet_name)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(profile)
    }

    #[instrument(skip(self), fields(profile_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let profile = sqlx::query_as::<_, ProfileDBResponse>("SELECT * FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(profile)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, offset = filter.offset), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let sql = format!("SELECT p.* FROM profiles p {PROFILE_FILTER} ORDER BY p.created_at DESC, p.id LIMIT $3 OFFSET $4");
        let profiles = sqlx::query_as::<_, ProfileDBResponse>(&sql)
            .bind(filter.accessible_by)
            .bind(filter.service_id)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(profiles)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM profiles p {PROFILE_FILTER}");
        let total = sqlx::query_scalar::<_, i64>(&sql)
            .bind(filter.accessible_by)
            .bind(filter.service_id)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(total)
    }

    #[instrument(skip(self), fields(profile_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM profiles WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(profile_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let profile = sqlx::query_as::<_, ProfileDBResponse>(
            r#"
            UPDATE profiles SET
                service_id = COALESCE($2, service_id),
                name = COALESCE($3, name),
                sheet_url = COALESCE($4, sheet_url),
                sheet_name = COALESCE($5, sheet_name),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.service_id)
        .bind(&request.name)
        .bind(&request.sheet_url)
        .bind(&request.sheet_name)
        .fetch_optional(&mut *self.db)
        .await?;
        profile.ok_or(DbError::NotFound)
    }
}

#[cfg(all(test, feature = "live-db-tests"))]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_service, create_test_user};
    use sqlx::PgPool;

    fn request(user_id: UserId, service_id: ServiceId, name: &str) -> ProfileCreateDBRequest {
        ProfileCreateDBRequest {
            user_id,
            service_id,
            name: name.to_string(),
            sheet_url: None,
            sheet_name: None,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_owner_and_member_access(pool: PgPool) {
        let owner = create_test_user(&pool, "USER").await;
        let member = create_test_user(&pool, "USER").await;
        let stranger = create_test_user(&pool, "USER").await;
        let service = create_test_service(&pool).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Profiles::new(&mut conn);
        let profile = repo.create(&request(owner.id, service.id, "Main")).await.unwrap();

        assert!(repo.add_member(member.id, profile.id).await.unwrap());
        assert!(!repo.add_member(member.id, profile.id).await.unwrap());

        assert!(repo.has_access(owner.id, profile.id).await.unwrap());
        assert!(repo.has_access(member.id, profile.id).await.unwrap());
        assert!(!repo.has_access(stranger.id, profile.id).await.unwrap());

        let visible = ProfileFilter {
            accessible_by: Some(member.id),
            limit: 10,
            ..Default::default()
        };
        assert_eq!(repo.count(&visible).await.unwrap(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_profile_name_unique_per_owner(pool: PgPool) {
        let owner = create_test_user(&pool, "USER").await;
        let other = create_test_user(&pool, "USER").await;
        let service = create_test_service(&pool).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Profiles::new(&mut conn);
        repo.create(&request(owner.id, service.id, "Main")).await.unwrap();

        let dup = repo.create(&request(owner.id, service.id, "Main")).await;
        assert!(matches!(dup, Err(DbError::UniqueViolation { .. })));
        repo.create(&request(other.id, service.id, "Main")).await.unwrap();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_with_sheets_skips_unbound(pool: PgPool) {
        let owner = create_test_user(&pool, "USER").await;
        let service = create_test_service(&pool).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Profiles::new(&mut conn);
        repo.create(&request(owner.id, service.id, "Unbound")).await.unwrap();
        let bound = repo
            .create(&ProfileCreateDBRequest {
                sheet_url: Some("https://docs.google.com/spreadsheets/d/abc123/edit".to_string()),
                sheet_name: Some("Leads".to_string()),
                ..request(owner.id, service.id, "Bound")
            })
            .await
            .unwrap();

        let syncable = repo.list_with_sheets().await.unwrap();
        assert_eq!(syncable.len(), 1);
        assert_eq!(syncable[0].id, bound.id);

        repo.mark_synced(bound.id).await.unwrap();
        let refreshed = repo.get_by_id(bound.id).await.unwrap().unwrap();
        assert!(refreshed.last_synced_at.is_some());
    }
}
