//! Database repositories for jobs, skills and applications.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::careers::{
        ApplicationCreateDBRequest, ApplicationDBResponse, ApplicationStatus, ApplicationUpdateDBRequest, EmploymentType,
        JobCreateDBRequest, JobDBResponse, JobUpdateDBRequest, SkillCreateDBRequest, SkillDBResponse, SkillUpdateDBRequest,
    },
};
use crate::types::{ApplicationId, JobId, ServiceId, SkillId, abbrev_uuid};
use sqlx::{Connection, PgConnection};
use tracing::instrument;

#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub is_open: Option<bool>,
    pub employment_type: Option<EmploymentType>,
    pub service_id: Option<ServiceId>,
    pub skill_id: Option<SkillId>,
    pub offset: i64,
    pub limit: i64,
}

const JOB_SELECT: &str = r#"
    SELECT j.id, j.title, j.description, j.location, j.employment_type, j.service_id, j.is_open,
        ARRAY(
            SELECT js.skill_id FROM job_skills js WHERE js.job_id = j.id ORDER BY js.skill_id
        ) AS skill_ids,
        j.created_at, j.updated_at
    FROM jobs j
"#;

const JOB_FILTER: &str = r#"
    WHERE ($1::bool IS NULL OR j.is_open = $1)
      AND ($2::employment_type IS NULL OR j.employment_type = $2)
      AND ($3::uuid IS NULL OR j.service_id = $3)
      AND ($4::uuid IS NULL OR EXISTS (SELECT 1 FROM job_skills js WHERE js.job_id = j.id AND js.skill_id = $4))
"#;

async fn fetch_job(conn: &mut PgConnection, id: JobId) -> Result<Option<JobDBResponse>> {
    let sql = format!("{JOB_SELECT} WHERE j.id = $1");
    Ok(sqlx::query_as::<_, JobDBResponse>(&sql).bind(id).fetch_optional(conn).await?)
}

async fn link_skills(conn: &mut PgConnection, job_id: JobId, skill_ids: &[SkillId]) -> Result<()> {
    sqlx::query("DELETE FROM job_skills WHERE job_id = $1")
        .bind(job_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("INSERT INTO job_skills (job_id, skill_id) SELECT $1, s FROM UNNEST($2::uuid[]) AS s ON CONFLICT DO NOTHING")
        .bind(job_id)
        .bind(skill_ids)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub struct Jobs<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Jobs<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, skill_ids), fields(job_id = %abbrev_uuid(&id), count = skill_ids.len()), err)]
    pub async fn set_skills(&mut self, id: JobId, skill_ids: &[SkillId]) -> Result<JobDBResponse> {
        let mut tx = self.db.begin().await?;
        if fetch_job(&mut tx, id).await?.is_none() {
            return Err(DbError::NotFound);
        }
        link_skills(&mut tx, id, skill_ids).await?;
        let job = fetch_job(&mut tx, id).await?.ok_or(DbError::NotFound)?;
        tx.commit().await?;
        Ok(job)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Jobs<'c> {
    type CreateRequest = JobCreateDBRequest;
    type UpdateRequest = JobUpdateDBRequest;
    type Response = JobDBResponse;
    type Id = JobId;
    type Filter = JobFilter;

    #[instrument(skip(self, request), fields(title = %request.title), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;
        let id: JobId = sqlx::query_scalar(
            r#"
            INSERT INTO jobs (title, description, location, employment_type, service_id, is_open)
            VALUES ($1, $2, $3, COALESCE($4, 'FULL_TIME'::employment_type), $5, COALESCE($6, TRUE))
            RETURNING id
            "#,
        )
        .bind(&request.title)
        .bind(&request.description)
        .bind(&request.location)
        .bind(request.employment_type)
        .bind(request.service_id)
        .bind(request.is_open)
        .fetch_one(&mut *tx)
        .await?;
        link_skills(&mut tx, id, &request.skill_ids).await?;
        let job = fetch_job(&mut tx, id).await?.ok_or(DbError::NotFound)?;
        tx.commit().await?;
        Ok(job)
    }

    #[instrument(skip(self), fields(job_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        fetch_job(self.db, id).await
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, offset = filter.offset), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let sql = format!("{JOB_SELECT} {JOB_FILTER} ORDER BY j.created_at DESC, j.id LIMIT $5 OFFSET $6");
        let jobs = sqlx::query_as::<_, JobDBResponse>(&sql)
            .bind(filter.is_open)
            .bind(filter.employment_type)
            .bind(filter.service_id)
            .bind(filter.skill_id)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(jobs)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM jobs j {JOB_FILTER}");
        let total = sqlx::query_scalar::<_, i64>(&sql)
            .bind(filter.is_open)
            .bind(filter.employment_type)
            .bind(filter.service_id)
            .bind(filter.skill_id)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(total)
    }

    #[instrument(skip(self), fields(job_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(job_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let updated: Option<JobId> = sqlx::query_scalar(
            r#"
            UPDATE jobs SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                location = COALESCE($4, location),
                employment_type = COALESCE($5, employment_type),
                service_id = COALESCE($6, service_id),
                is_open = COALESCE($7, is_open),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(&request.title)
        .bind(&request.description)
        .bind(&request.location)
        .bind(request.employment_type)
        .bind(request.service_id)
        .bind(request.is_open)
        .fetch_optional(&mut *self.db)
        .await?;

        if updated.is_none() {
            return Err(DbError::NotFound);
        }
        fetch_job(self.db, id).await?.ok_or(DbError::NotFound)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SkillFilter {
    pub name: Option<String>,
    pub offset: i64,
    pub limit: i64,
}

pub struct Skills<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Skills<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Skills<'c> {
    type CreateRequest = SkillCreateDBRequest;
    type UpdateRequest = SkillUpdateDBRequest;
    type Response = SkillDBResponse;
    type Id = SkillId;
    type Filter = SkillFilter;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let skill = sqlx::query_as::<_, SkillDBResponse>("INSERT INTO skills (name) VALUES ($1) RETURNING *")
            .bind(&request.name)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(skill)
    }

    #[instrument(skip(self), fields(skill_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let skill = sqlx::query_as::<_, SkillDBResponse>("SELECT * FROM skills WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(skill)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, offset = filter.offset), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let skills = sqlx::query_as::<_, SkillDBResponse>(
            "SELECT * FROM skills WHERE ($1::text IS NULL OR name = $1) ORDER BY name LIMIT $2 OFFSET $3",
        )
        .bind(&filter.name)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(skills)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM skills WHERE ($1::text IS NULL OR name = $1)")
            .bind(&filter.name)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(total)
    }

    #[instrument(skip(self), fields(skill_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM skills WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(skill_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let skill = sqlx::query_as::<_, SkillDBResponse>(
            "UPDATE skills SET name = COALESCE($2, name), updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&request.name)
        .fetch_optional(&mut *self.db)
        .await?;
        skill.ok_or(DbError::NotFound)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ApplicationFilter {
    pub job_id: Option<JobId>,
    pub email: Option<String>,
    pub status: Option<ApplicationStatus>,
    pub offset: i64,
    pub limit: i64,
}

const APPLICATION_FILTER: &str = r#"
    WHERE ($1::uuid IS NULL OR job_id = $1)
      AND ($2::text IS NULL OR email = $2)
      AND ($3::application_status IS NULL OR status = $3)
"#;

pub struct Applications<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Applications<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Applications<'c> {
    type CreateRequest = ApplicationCreateDBRequest;
    type UpdateRequest = ApplicationUpdateDBRequest;
    type Response = ApplicationDBResponse;
    type Id = ApplicationId;
    type Filter = ApplicationFilter;

    #[instrument(skip(self, request), fields(job_id = %abbrev_uuid(&request.job_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let application = sqlx::query_as::<_, ApplicationDBResponse>(
            r#"
            INSERT INTO applications (job_id, full_name, email, phone, cover_letter, resume_path)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(request.job_id)
        .bind(&request.full_name)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(&request.cover_letter)
        .bind(&request.resume_path)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(application)
    }

    #[instrument(skip(self), fields(application_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let application = sqlx::query_as::<_, ApplicationDBResponse>("SELECT * FROM applications WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(application)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, offset = filter.offset), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let sql = format!("SELECT * FROM applications {APPLICATION_FILTER} ORDER BY created_at DESC, id LIMIT $4 OFFSET $5");
        let applications = sqlx::query_as::<_, ApplicationDBResponse>(&sql)
            .bind(filter.job_id)
            .bind(&filter.email)
            .bind(filter.status)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(applications)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM applications {APPLICATION_FILTER}");
        let total = sqlx::query_scalar::<_, i64>(&sql)
            .bind(filter.job_id)
            .bind(&filter.email)
            .bind(filter.status)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(total)
    }

    #[instrument(skip(self), fields(application_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM applications WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(application_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let application = sqlx::query_as::<_, ApplicationDBResponse>(
            r#"
            UPDATE applications SET
                full_name = COALESCE($2, full_name),
                phone = COALESCE($3, phone),
                cover_letter = COALESCE($4, cover_letter),
                status = COALESCE($5, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.full_name)
        .bind(&request.phone)
        .bind(&request.cover_letter)
        .bind(request.status)
        .fetch_optional(&mut *self.db)
        .await?;
        application.ok_or(DbError::NotFound)
    }
}

#[cfg(all(test, feature = "live-db-tests"))]
mod tests {
    use super::*;
    use sqlx::PgPool;

    async fn skill(conn: &mut PgConnection, name: &str) -> SkillDBResponse {
        Skills::new(conn)
            .create(&SkillCreateDBRequest { name: name.to_string() })
            .await
            .unwrap()
    }

    fn job(title: &str, skill_ids: Vec<SkillId>) -> JobCreateDBRequest {
        JobCreateDBRequest {
            title: title.to_string(),
            description: None,
            location: Some("Remote".to_string()),
            employment_type: None,
            service_id: None,
            is_open: None,
            skill_ids,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_job_defaults_and_skills(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let rust = skill(&mut conn, "Rust").await;
        let sql = skill(&mut conn, "SQL").await;

        let mut jobs = Jobs::new(&mut conn);
        let created = jobs.create(&job("Backend engineer", vec![rust.id])).await.unwrap();
        assert_eq!(created.employment_type, EmploymentType::FullTime);
        assert!(created.is_open);
        assert_eq!(created.skill_ids, vec![rust.id]);

        let relinked = jobs.set_skills(created.id, &[sql.id]).await.unwrap();
        assert_eq!(relinked.skill_ids, vec![sql.id]);

        let dup = jobs.create(&job("Backend engineer", vec![])).await;
        assert!(matches!(dup, Err(DbError::UniqueViolation { .. })));

        let by_skill = JobFilter {
            skill_id: Some(sql.id),
            limit: 10,
            ..Default::default()
        };
        assert_eq!(jobs.count(&by_skill).await.unwrap(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_one_application_per_job_and_email(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let created = Jobs::new(&mut conn).create(&job("Account executive", vec![])).await.unwrap();

        let mut applications = Applications::new(&mut conn);
        let request = ApplicationCreateDBRequest {
            job_id: created.id,
            full_name: "Jane Doe".to_string(),
            email: "jane@example.com".to_string(),
            phone: None,
            cover_letter: None,
            resume_path: None,
        };
        let application = applications.create(&request).await.unwrap();
        assert_eq!(application.status, ApplicationStatus::Pending);
        assert!(matches!(applications.create(&request).await, Err(DbError::UniqueViolation { .. })));

        let missing_job = applications
            .create(&ApplicationCreateDBRequest {
                job_id: uuid::Uuid::new_v4(),
                ..request
            })
            .await;
        assert!(matches!(missing_job, Err(DbError::ForeignKeyViolation { .. })));
    }
}
