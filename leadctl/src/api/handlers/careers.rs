//! Careers: job postings, the skills they ask for, and applications.
//!
//! Postings and skills are public to read. Anyone may apply with a résumé
//! upload; reviewing applications is for administrators.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};

use super::uploads::UploadForm;
use crate::{
    AppState,
    api::models::{
        careers::{
            ApplicationCreate, ApplicationResponse, ApplicationUpdate, JobCreate, JobResponse, JobSkillsUpdate, JobUpdate,
            ListApplicationsQuery, ListJobsQuery, ListSkillsQuery, SkillCreate, SkillResponse, SkillUpdate,
        },
        normalize_email,
        pagination::PaginatedResponse,
        users::CurrentUser,
    },
    auth::permissions::{RequiresPermission, can_access_all, operation, resource},
    db::{
        handlers::{
            Applications, Jobs, Repository, Skills,
            attachments::{self, UploadOwner},
            careers::{ApplicationFilter, JobFilter, SkillFilter},
        },
        models::careers::{
            ApplicationCreateDBRequest, ApplicationDBResponse, ApplicationUpdateDBRequest, JobCreateDBRequest, JobUpdateDBRequest,
            SkillCreateDBRequest, SkillUpdateDBRequest,
        },
    },
    errors::{Error, Result},
    storage::UploadArea,
    types::{ApplicationId, JobId, Resource, SkillId},
};

fn job_not_found(id: JobId) -> Error {
    Error::NotFound {
        resource: "Job".to_string(),
        id: id.to_string(),
    }
}

fn skill_not_found(id: SkillId) -> Error {
    Error::NotFound {
        resource: "Skill".to_string(),
        id: id.to_string(),
    }
}

fn application_not_found(id: ApplicationId) -> Error {
    Error::NotFound {
        resource: "Application".to_string(),
        id: id.to_string(),
    }
}

fn non_empty(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::BadRequest {
            message: format!("{field} is required"),
        });
    }
    Ok(value.to_string())
}

#[utoipa::path(
    get,
    path = "/jobs",
    tag = "careers",
    summary = "List job postings",
    description = "Without administrator credentials only open postings are listed.",
    params(ListJobsQuery),
    responses((status = 200, description = "Page of jobs", body = PaginatedResponse<JobResponse>))
)]
#[tracing::instrument(skip_all)]
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
    current_user: Option<CurrentUser>,
) -> Result<Json<PaginatedResponse<JobResponse>>> {
    let sees_all = current_user.is_some_and(|user| can_access_all(&user, Resource::Jobs));
    let filter = JobFilter {
        is_open: if sees_all { query.is_open } else { Some(true) },
        employment_type: query.employment_type,
        service_id: query.service_id,
        skill_id: query.skill_id,
        offset: query.pagination.offset(),
        limit: query.pagination.limit(),
    };
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Jobs::new(&mut conn);
    let jobs = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;
    Ok(Json(PaginatedResponse::new(
        jobs.into_iter().map(JobResponse::from).collect(),
        total,
        &query.pagination,
    )))
}

#[utoipa::path(
    get,
    path = "/jobs/{id}",
    tag = "careers",
    summary = "Get job posting",
    params(("id" = String, Path, format = "uuid", description = "Job ID")),
    responses(
        (status = 200, description = "Job", body = JobResponse),
        (status = 404, description = "Not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_job(State(state): State<AppState>, Path(id): Path<JobId>) -> Result<Json<JobResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let job = Jobs::new(&mut conn).get_by_id(id).await?.ok_or_else(|| job_not_found(id))?;
    Ok(Json(JobResponse::from(job)))
}

#[utoipa::path(
    post,
    path = "/jobs",
    tag = "careers",
    summary = "Create job posting",
    request_body = JobCreate,
    responses(
        (status = 201, description = "Job created", body = JobResponse),
        (status = 409, description = "Title taken"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_job(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Jobs, operation::CreateAll>,
    Json(create): Json<JobCreate>,
) -> Result<(StatusCode, Json<JobResponse>)> {
    let title = non_empty("title", &create.title)?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let job = Jobs::new(&mut conn)
        .create(&JobCreateDBRequest {
            title,
            description: create.description,
            location: create.location,
            employment_type: create.employment_type,
            service_id: create.service_id,
            is_open: create.is_open,
            skill_ids: create.skill_ids,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(JobResponse::from(job))))
}

#[utoipa::path(
    patch,
    path = "/jobs/{id}",
    tag = "careers",
    summary = "Update job posting",
    params(("id" = String, Path, format = "uuid", description = "Job ID")),
    request_body = JobUpdate,
    responses(
        (status = 200, description = "Updated job", body = JobResponse),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_job(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
    _: RequiresPermission<resource::Jobs, operation::UpdateAll>,
    Json(update): Json<JobUpdate>,
) -> Result<Json<JobResponse>> {
    let title = update.title.as_deref().map(|t| non_empty("title", t)).transpose()?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Jobs::new(&mut conn);
    repo.get_by_id(id).await?.ok_or_else(|| job_not_found(id))?;
    let job = repo
        .update(
            id,
            &JobUpdateDBRequest {
                title,
                description: update.description,
                location: update.location,
                employment_type: update.employment_type,
                service_id: update.service_id,
                is_open: update.is_open,
            },
        )
        .await?;
    Ok(Json(JobResponse::from(job)))
}

#[utoipa::path(
    put,
    path = "/jobs/{id}/skills",
    tag = "careers",
    summary = "Replace a job's skills",
    params(("id" = String, Path, format = "uuid", description = "Job ID")),
    request_body = JobSkillsUpdate,
    responses(
        (status = 200, description = "Job with its new skills", body = JobResponse),
        (status = 400, description = "Unknown skill"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn set_job_skills(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
    _: RequiresPermission<resource::Jobs, operation::UpdateAll>,
    Json(update): Json<JobSkillsUpdate>,
) -> Result<Json<JobResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let job = Jobs::new(&mut conn).set_skills(id, &update.skill_ids).await?;
    Ok(Json(JobResponse::from(job)))
}

#[utoipa::path(
    delete,
    path = "/jobs/{id}",
    tag = "careers",
    summary = "Delete job posting",
    params(("id" = String, Path, format = "uuid", description = "Job ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
    _: RequiresPermission<resource::Jobs, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let orphaned = attachments::orphaned_by(&mut tx, UploadOwner::Job(id)).await?;
    if !Jobs::new(&mut tx).delete(id).await? {
        return Err(job_not_found(id));
    }
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    state.uploads.remove_all_in_background(orphaned);
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/skills",
    tag = "careers",
    summary = "List skills",
    params(ListSkillsQuery),
    responses((status = 200, description = "Page of skills", body = PaginatedResponse<SkillResponse>))
)]
#[tracing::instrument(skip_all)]
pub async fn list_skills(
    State(state): State<AppState>,
    Query(query): Query<ListSkillsQuery>,
) -> Result<Json<PaginatedResponse<SkillResponse>>> {
    let filter = SkillFilter {
        name: query.name,
        offset: query.pagination.offset(),
        limit: query.pagination.limit(),
    };
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Skills::new(&mut conn);
    let skills = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;
    Ok(Json(PaginatedResponse::new(
        skills.into_iter().map(SkillResponse::from).collect(),
        total,
        &query.pagination,
    )))
}

#[utoipa::path(
    post,
    path = "/skills",
    tag = "careers",
    summary = "Create skill",
    request_body = SkillCreate,
    responses(
        (status = 201, description = "Skill created", body = SkillResponse),
        (status = 409, description = "Name taken"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_skill(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Jobs, operation::CreateAll>,
    Json(create): Json<SkillCreate>,
) -> Result<(StatusCode, Json<SkillResponse>)> {
    let name = non_empty("name", &create.name)?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let skill = Skills::new(&mut conn).create(&SkillCreateDBRequest { name }).await?;
    Ok((StatusCode::CREATED, Json(SkillResponse::from(skill))))
}

#[utoipa::path(
    patch,
    path = "/skills/{id}",
    tag = "careers",
    summary = "Rename skill",
    params(("id" = String, Path, format = "uuid", description = "Skill ID")),
    request_body = SkillUpdate,
    responses(
        (status = 200, description = "Updated skill", body = SkillResponse),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_skill(
    State(state): State<AppState>,
    Path(id): Path<SkillId>,
    _: RequiresPermission<resource::Jobs, operation::UpdateAll>,
    Json(update): Json<SkillUpdate>,
) -> Result<Json<SkillResponse>> {
    let name = update.name.as_deref().map(|n| non_empty("name", n)).transpose()?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Skills::new(&mut conn);
    repo.get_by_id(id).await?.ok_or_else(|| skill_not_found(id))?;
    let skill = repo.update(id, &SkillUpdateDBRequest { name }).await?;
    Ok(Json(SkillResponse::from(skill)))
}

#[utoipa::path(
    delete,
    path = "/skills/{id}",
    tag = "careers",
    summary = "Delete skill",
    params(("id" = String, Path, format = "uuid", description = "Skill ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_skill(
    State(state): State<AppState>,
    Path(id): Path<SkillId>,
    _: RequiresPermission<resource::Jobs, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !Skills::new(&mut conn).delete(id).await? {
        return Err(skill_not_found(id));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn insert_application(state: &AppState, form: &UploadForm) -> Result<ApplicationDBResponse> {
    let create: ApplicationCreate = form.parse()?;
    let full_name = non_empty("fullName", &create.full_name)?;
    let email = non_empty("email", &normalize_email(&create.email))?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let job = Jobs::new(&mut conn)
        .get_by_id(create.job_id)
        .await?
        .ok_or_else(|| job_not_found(create.job_id))?;
    if !job.is_open {
        return Err(Error::BadRequest {
            message: "This job is not accepting applications".to_string(),
        });
    }
    let application = Applications::new(&mut conn)
        .create(&ApplicationCreateDBRequest {
            job_id: create.job_id,
            full_name,
            email,
            phone: create.phone,
            cover_letter: create.cover_letter,
            resume_path: form.document_path(),
        })
        .await?;
    Ok(application)
}

#[utoipa::path(
    post,
    path = "/applications",
    tag = "careers",
    summary = "Apply for a job",
    description = "Multipart form with the applicant fields and an optional résumé under `file`.",
    request_body(content = ApplicationCreate, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Application received", body = ApplicationResponse),
        (status = 400, description = "Job closed or field missing"),
        (status = 404, description = "Unknown job"),
        (status = 409, description = "Already applied with this email"),
        (status = 413, description = "File too large"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_application(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ApplicationResponse>)> {
    let mut form = UploadForm::read(&state.uploads, UploadArea::Applications, multipart).await?;
    let result = insert_application(&state, &form).await;
    let application = form.settle(&state.uploads, result)?;
    Ok((StatusCode::CREATED, Json(ApplicationResponse::from(application))))
}

#[utoipa::path(
    get,
    path = "/applications",
    tag = "careers",
    summary = "List applications",
    params(ListApplicationsQuery),
    responses((status = 200, description = "Page of applications", body = PaginatedResponse<ApplicationResponse>)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_applications(
    State(state): State<AppState>,
    Query(query): Query<ListApplicationsQuery>,
    _: RequiresPermission<resource::Applications, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<ApplicationResponse>>> {
    let filter = ApplicationFilter {
        job_id: query.job_id,
        email: query.email.as_deref().map(normalize_email),
        status: query.status,
        offset: query.pagination.offset(),
        limit: query.pagination.limit(),
    };
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Applications::new(&mut conn);
    let applications = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;
    Ok(Json(PaginatedResponse::new(
        applications.into_iter().map(ApplicationResponse::from).collect(),
        total,
        &query.pagination,
    )))
}

#[utoipa::path(
    get,
    path = "/applications/{id}",
    tag = "careers",
    summary = "Get application",
    params(("id" = String, Path, format = "uuid", description = "Application ID")),
    responses(
        (status = 200, description = "Application", body = ApplicationResponse),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_application(
    State(state): State<AppState>,
    Path(id): Path<ApplicationId>,
    _: RequiresPermission<resource::Applications, operation::ReadAll>,
) -> Result<Json<ApplicationResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let application = Applications::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| application_not_found(id))?;
    Ok(Json(ApplicationResponse::from(application)))
}

#[utoipa::path(
    patch,
    path = "/applications/{id}",
    tag = "careers",
    summary = "Update application",
    params(("id" = String, Path, format = "uuid", description = "Application ID")),
    request_body = ApplicationUpdate,
    responses(
        (status = 200, description = "Updated application", body = ApplicationResponse),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_application(
    State(state): State<AppState>,
    Path(id): Path<ApplicationId>,
    _: RequiresPermission<resource::Applications, operation::UpdateAll>,
    Json(update): Json<ApplicationUpdate>,
) -> Result<Json<ApplicationResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Applications::new(&mut conn);
    repo.get_by_id(id).await?.ok_or_else(|| application_not_found(id))?;
    let application = repo
        .update(
            id,
            &ApplicationUpdateDBRequest {
                full_name: update.full_name,
                phone: update.phone,
                cover_letter: update.cover_letter,
                status: update.status,
            },
        )
        .await?;
    Ok(Json(ApplicationResponse::from(application)))
}

#[utoipa::path(
    delete,
    path = "/applications/{id}",
    tag = "careers",
    summary = "Delete application",
    description = "The résumé is removed in the background; a failure there does not fail the request.",
    params(("id" = String, Path, format = "uuid", description = "Application ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_application(
    State(state): State<AppState>,
    Path(id): Path<ApplicationId>,
    _: RequiresPermission<resource::Applications, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Applications::new(&mut conn);
    let application = repo.get_by_id(id).await?.ok_or_else(|| application_not_found(id))?;
    repo.delete(id).await?;
    if let Some(path) = application.resume_path {
        state.uploads.remove_in_background(path);
    }
    Ok(StatusCode::NO_CONTENT)
}
