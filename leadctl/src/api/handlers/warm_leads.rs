//! Warm leads: contacts a profile is already talking to outside the spreadsheet.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use sqlx::PgConnection;

use crate::{
    AppState,
    api::models::{
        normalize_email,
        pagination::PaginatedResponse,
        users::CurrentUser,
        warm_leads::{ListWarmLeadsQuery, WarmLeadCreate, WarmLeadResponse, WarmLeadUpdate},
    },
    auth::permissions::{RequiresPermission, ensure_profile_access, operation, require_profile_filter, resource},
    db::{
        handlers::{Repository, WarmLeads, warm_leads::WarmLeadFilter},
        models::warm_leads::{WarmLeadCreateDBRequest, WarmLeadDBResponse, WarmLeadUpdateDBRequest},
    },
    errors::{Error, Result},
    types::WarmLeadId,
};

async fn accessible_warm_lead(conn: &mut PgConnection, user: &CurrentUser, id: WarmLeadId) -> Result<WarmLeadDBResponse> {
    let warm_lead = WarmLeads::new(&mut *conn).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Warm lead".to_string(),
        id: id.to_string(),
    })?;
    ensure_profile_access(conn, user, warm_lead.profile_id).await?;
    Ok(warm_lead)
}

#[utoipa::path(
    get,
    path = "/warm-leads",
    tag = "warm-leads",
    summary = "List warm leads",
    params(ListWarmLeadsQuery),
    responses((status = 200, description = "Page of warm leads", body = PaginatedResponse<WarmLeadResponse>)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_warm_leads(
    State(state): State<AppState>,
    Query(query): Query<ListWarmLeadsQuery>,
    current_user: RequiresPermission<resource::WarmLeads, operation::ReadOwn>,
) -> Result<Json<PaginatedResponse<WarmLeadResponse>>> {
    let profile_id = require_profile_filter(&current_user, query.profile_id)?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if let Some(profile_id) = profile_id {
        ensure_profile_access(&mut conn, &current_user, profile_id).await?;
    }

    let filter = WarmLeadFilter {
        profile_id,
        status: query.status,
        email: query.email.as_deref().map(normalize_email),
        offset: query.pagination.offset(),
        limit: query.pagination.limit(),
    };
    let mut repo = WarmLeads::new(&mut conn);
    let warm_leads = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;
    Ok(Json(PaginatedResponse::new(
        warm_leads.into_iter().map(WarmLeadResponse::from).collect(),
        total,
        &query.pagination,
    )))
}

#[utoipa::path(
    post,
    path = "/warm-leads",
    tag = "warm-leads",
    summary = "Create warm lead",
    request_body = WarmLeadCreate,
    responses(
        (status = 201, description = "Warm lead created", body = WarmLeadResponse),
        (status = 409, description = "Email already tracked in this profile"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_warm_lead(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::WarmLeads, operation::CreateOwn>,
    Json(create): Json<WarmLeadCreate>,
) -> Result<(StatusCode, Json<WarmLeadResponse>)> {
    let email = normalize_email(&create.email);
    if email.is_empty() || create.contact_name.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "contactName and email are required".to_string(),
        });
    }
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    ensure_profile_access(&mut conn, &current_user, create.profile_id).await?;

    let warm_lead = WarmLeads::new(&mut conn)
        .create(&WarmLeadCreateDBRequest {
            profile_id: create.profile_id,
            company_name: create.company_name,
            contact_name: create.contact_name,
            email,
            phone: create.phone,
            notes: create.notes,
            status: create.status,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(WarmLeadResponse::from(warm_lead))))
}

#[utoipa::path(
    get,
    path = "/warm-leads/{id}",
    tag = "warm-leads",
    summary = "Get warm lead",
    params(("id" = String, Path, format = "uuid", description = "Warm lead ID")),
    responses(
        (status = 200, description = "Warm lead", body = WarmLeadResponse),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_warm_lead(
    State(state): State<AppState>,
    Path(id): Path<WarmLeadId>,
    current_user: RequiresPermission<resource::WarmLeads, operation::ReadOwn>,
) -> Result<Json<WarmLeadResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let warm_lead = accessible_warm_lead(&mut conn, &current_user, id).await?;
    Ok(Json(WarmLeadResponse::from(warm_lead)))
}

#[utoipa::path(
    patch,
    path = "/warm-leads/{id}",
    tag = "warm-leads",
    summary = "Update warm lead",
    params(("id" = String, Path, format = "uuid", description = "Warm lead ID")),
    request_body = WarmLeadUpdate,
    responses(
        (status = 200, description = "Updated warm lead", body = WarmLeadResponse),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_warm_lead(
    State(state): State<AppState>,
    Path(id): Path<WarmLeadId>,
    current_user: RequiresPermission<resource::WarmLeads, operation::UpdateOwn>,
    Json(update): Json<WarmLeadUpdate>,
) -> Result<Json<WarmLeadResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    accessible_warm_lead(&mut conn, &current_user, id).await?;
    let warm_lead = WarmLeads::new(&mut conn)
        .update(
            id,
            &WarmLeadUpdateDBRequest {
                company_name: update.company_name,
                contact_name: update.contact_name,
                email: update.email.as_deref().map(normalize_email),
                phone: update.phone,
                notes: update.notes,
                status: update.status,
            },
        )
        .await?;
    Ok(Json(WarmLeadResponse::from(warm_lead)))
}

#[utoipa::path(
    delete,
    path = "/warm-leads/{id}",
    tag = "warm-leads",
    summary = "Delete warm lead",
    params(("id" = String, Path, format = "uuid", description = "Warm lead ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_warm_lead(
    State(state): State<AppState>,
    Path(id): Path<WarmLeadId>,
    current_user: RequiresPermission<resource::WarmLeads, operation::DeleteOwn>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    accessible_warm_lead(&mut conn, &current_user, id).await?;
    WarmLeads::new(&mut conn).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(all(test, feature = "live-db-tests"))]
mod tests {
    use crate::api::models::warm_leads::WarmLeadResponse;
    use crate::db::models::warm_leads::WarmLeadStatus;
    use crate::test_utils::{bearer, create_test_app, create_test_profile, profile_owner};
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_warm_lead_crud(pool: PgPool) {
        let (server, _bg, _dir) = create_test_app(pool.clone()).await;
        let profile = create_test_profile(&pool).await;
        let owner = profile_owner(&pool, &profile).await;
        let body = json!({"profileId": profile.id, "contactName": "Dana", "email": "Dana@Example.com"});

        let created = server
            .post("/api/v0.1/warm-leads")
            .add_header("authorization", bearer(&owner))
            .json(&body)
            .await;
        created.assert_status(StatusCode::CREATED);
        let warm_lead: WarmLeadResponse = created.json();
        assert_eq!(warm_lead.email, "dana@example.com");
        assert_eq!(warm_lead.status, WarmLeadStatus::New);

        server
            .post("/api/v0.1/warm-leads")
            .add_header("authorization", bearer(&owner))
            .json(&body)
            .await
            .assert_status(StatusCode::CONFLICT);

        let updated: WarmLeadResponse = server
            .patch(&format!("/api/v0.1/warm-leads/{}", warm_lead.warm_lead_id))
            .add_header("authorization", bearer(&owner))
            .json(&json!({"status": "CONTACTED", "notes": "Call back Tuesday"}))
            .await
            .json();
        assert_eq!(updated.status, WarmLeadStatus::Contacted);

        server
            .delete(&format!("/api/v0.1/warm-leads/{}", warm_lead.warm_lead_id))
            .add_header("authorization", bearer(&owner))
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }
}
