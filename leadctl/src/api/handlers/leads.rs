//! Leads: the open side of a profile's pipeline.
//!
//! Setting a lead's status to `SALE_MADE` moves it into sales under the same id.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use sqlx::PgConnection;

use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        pipeline::{LeadCreate, LeadResponse, LeadUpdate, ListLeadsQuery, PipelineEntry, SaleResponse},
        users::CurrentUser,
    },
    auth::permissions::{RequiresPermission, ensure_profile_access, operation, require_profile_filter, resource},
    db::{
        handlers::{Leads, Pipeline, Repository, leads::LeadFilter},
        models::leads::{LeadCreateDBRequest, LeadDBResponse, LeadStatus, LeadUpdateDBRequest},
    },
    errors::{Error, Result},
    types::PipelineId,
};

/// Load a lead the caller may work on.
async fn accessible_lead(conn: &mut PgConnection, user: &CurrentUser, id: PipelineId) -> Result<LeadDBResponse> {
    let lead = Leads::new(&mut *conn).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Lead".to_string(),
        id: id.to_string(),
    })?;
    ensure_profile_access(conn, user, lead.profile_id).await?;
    Ok(lead)
}

#[utoipa::path(
    get,
    path = "/leads",
    tag = "leads",
    summary = "List leads",
    params(ListLeadsQuery),
    responses(
        (status = 200, description = "Page of leads", body = PaginatedResponse<LeadResponse>),
        (status = 400, description = "profileId missing"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_leads(
    State(state): State<AppState>,
    Query(query): Query<ListLeadsQuery>,
    current_user: RequiresPermission<resource::Leads, operation::ReadOwn>,
) -> Result<Json<PaginatedResponse<LeadResponse>>> {
    let profile_id = require_profile_filter(&current_user, query.profile_id)?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if let Some(profile_id) = profile_id {
        ensure_profile_access(&mut conn, &current_user, profile_id).await?;
    }

    let filter = LeadFilter {
        profile_id,
        status: query.status,
        external_id: query.external_id,
        offset: query.pagination.offset(),
        limit: query.pagination.limit(),
    };
    let mut repo = Leads::new(&mut conn);
    let leads = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;
    Ok(Json(PaginatedResponse::new(
        leads.into_iter().map(LeadResponse::from).collect(),
        total,
        &query.pagination,
    )))
}

#[utoipa::path(
    post,
    path = "/leads",
    tag = "leads",
    summary = "Create lead",
    request_body = LeadCreate,
    responses(
        (status = 201, description = "Lead created", body = LeadResponse),
        (status = 400, description = "SALE_MADE is not a valid initial status"),
        (status = 409, description = "External id already used in this profile"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_lead(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Leads, operation::CreateOwn>,
    Json(create): Json<LeadCreate>,
) -> Result<(StatusCode, Json<LeadResponse>)> {
    if create.status == Some(LeadStatus::SaleMade) {
        return Err(Error::BadRequest {
            message: "A lead cannot be created as SALE_MADE".to_string(),
        });
    }
    if !create.record.is_object() {
        return Err(Error::BadRequest {
            message: "record must be a JSON object".to_string(),
        });
    }
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    ensure_profile_access(&mut conn, &current_user, create.profile_id).await?;

    let lead = Leads::new(&mut conn)
        .create(&LeadCreateDBRequest {
            id: None,
            profile_id: create.profile_id,
            external_id: create.external_id,
            record: create.record,
            status: create.status.unwrap_or(LeadStatus::Lead),
            comment: create.comment,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(LeadResponse::from(lead))))
}

#[utoipa::path(
    get,
    path = "/leads/{id}",
    tag = "leads",
    summary = "Get lead",
    params(("id" = String, Path, format = "uuid", description = "Lead ID")),
    responses(
        (status = 200, description = "Lead", body = LeadResponse),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_lead(
    State(state): State<AppState>,
    Path(id): Path<PipelineId>,
    current_user: RequiresPermission<resource::Leads, operation::ReadOwn>,
) -> Result<Json<LeadResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let lead = accessible_lead(&mut conn, &current_user, id).await?;
    Ok(Json(LeadResponse::from(lead)))
}

#[utoipa::path(
    patch,
    path = "/leads/{id}",
    tag = "leads",
    summary = "Update lead",
    description = "`status: SALE_MADE` moves the lead into sales with stage `NEW` and answers with the sale.",
    params(("id" = String, Path, format = "uuid", description = "Lead ID")),
    request_body = LeadUpdate,
    responses(
        (status = 200, description = "The lead, or the sale it became", body = PipelineEntry),
        (status = 400, description = "Empty update"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_lead(
    State(state): State<AppState>,
    Path(id): Path<PipelineId>,
    current_user: RequiresPermission<resource::Leads, operation::UpdateOwn>,
    Json(update): Json<LeadUpdate>,
) -> Result<Json<PipelineEntry>> {
    if update.status.is_none() && update.comment.is_none() {
        return Err(Error::BadRequest {
            message: "Lead update must change at least one field".to_string(),
        });
    }
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    accessible_lead(&mut conn, &current_user, id).await?;

    let entry = match update.status {
        Some(LeadStatus::SaleMade) => {
            let sale = Pipeline::new(&mut conn).lead_to_sale(id, update.comment).await?;
            PipelineEntry::Sale(SaleResponse::from(sale))
        }
        status => {
            let lead = Leads::new(&mut conn)
                .update(
                    id,
                    &LeadUpdateDBRequest {
                        status,
                        comment: update.comment,
                        record: None,
                    },
                )
                .await?;
            PipelineEntry::Lead(LeadResponse::from(lead))
        }
    };
    Ok(Json(entry))
}

#[utoipa::path(
    delete,
    path = "/leads/{id}",
    tag = "leads",
    summary = "Delete lead",
    params(("id" = String, Path, format = "uuid", description = "Lead ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_lead(
    State(state): State<AppState>,
    Path(id): Path<PipelineId>,
    current_user: RequiresPermission<resource::Leads, operation::DeleteOwn>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    accessible_lead(&mut conn, &current_user, id).await?;
    Leads::new(&mut conn).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
