//! Guest requests: a guest asking for a service.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use sqlx::PgConnection;

use crate::{
    AppState,
    api::models::{
        approvals::ApprovalReport,
        guests::{GuestRequestCreate, GuestRequestResponse, GuestRequestUpdate, ListGuestRequestsQuery},
        pagination::PaginatedResponse,
    },
    approvals::Approvals,
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{Categories, GuestRequests, Guests, Repository, Services, guest_requests::GuestRequestFilter},
        models::guest_requests::{GuestRequestCreateDBRequest, GuestRequestUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{CategoryId, GuestRequestId, ServiceId},
};

fn request_not_found(id: GuestRequestId) -> Error {
    Error::NotFound {
        resource: "Guest request".to_string(),
        id: id.to_string(),
    }
}

/// Referenced catalog rows must exist; a dangling id is a 404, not a constraint error.
async fn ensure_catalog_refs(conn: &mut PgConnection, service_id: Option<ServiceId>, category_id: Option<CategoryId>) -> Result<()> {
    if let Some(service_id) = service_id
        && Services::new(&mut *conn).get_by_id(service_id).await?.is_none()
    {
        return Err(Error::NotFound {
            resource: "Service".to_string(),
            id: service_id.to_string(),
        });
    }
    if let Some(category_id) = category_id
        && Categories::new(&mut *conn).get_by_id(category_id).await?.is_none()
    {
        return Err(Error::NotFound {
            resource: "Category".to_string(),
            id: category_id.to_string(),
        });
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/guest-requests",
    tag = "guest-requests",
    summary = "Request a service",
    request_body = GuestRequestCreate,
    responses(
        (status = 201, description = "Request recorded", body = GuestRequestResponse),
        (status = 404, description = "Unknown guest, service or category"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_guest_request(
    State(state): State<AppState>,
    Json(create): Json<GuestRequestCreate>,
) -> Result<(StatusCode, Json<GuestRequestResponse>)> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Guests::new(&mut conn).get_by_id(create.guest_id).await?.is_none() {
        return Err(Error::NotFound {
            resource: "Guest".to_string(),
            id: create.guest_id.to_string(),
        });
    }
    ensure_catalog_refs(&mut conn, Some(create.service_id), create.category_id).await?;

    let request = GuestRequests::new(&mut conn)
        .create(&GuestRequestCreateDBRequest {
            guest_id: create.guest_id,
            service_id: create.service_id,
            category_id: create.category_id,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(GuestRequestResponse::from(request))))
}

#[utoipa::path(
    get,
    path = "/guest-requests",
    tag = "guest-requests",
    summary = "List guest requests",
    params(ListGuestRequestsQuery),
    responses((status = 200, description = "Page of requests", body = PaginatedResponse<GuestRequestResponse>)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_guest_requests(
    State(state): State<AppState>,
    Query(query): Query<ListGuestRequestsQuery>,
    _: RequiresPermission<resource::GuestRequests, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<GuestRequestResponse>>> {
    let filter = GuestRequestFilter {
        guest_id: query.guest_id,
        service_id: query.service_id,
        status: query.status,
        offset: query.pagination.offset(),
        limit: query.pagination.limit(),
    };
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = GuestRequests::new(&mut conn);
    let requests = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;
    Ok(Json(PaginatedResponse::new(
        requests.into_iter().map(GuestRequestResponse::from).collect(),
        total,
        &query.pagination,
    )))
}

#[utoipa::path(
    get,
    path = "/guest-requests/{id}",
    tag = "guest-requests",
    summary = "Get guest request",
    params(("id" = String, Path, format = "uuid", description = "Guest request ID")),
    responses(
        (status = 200, description = "Guest request", body = GuestRequestResponse),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_guest_request(
    State(state): State<AppState>,
    Path(id): Path<GuestRequestId>,
    _: RequiresPermission<resource::GuestRequests, operation::ReadAll>,
) -> Result<Json<GuestRequestResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let request = GuestRequests::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| request_not_found(id))?;
    Ok(Json(GuestRequestResponse::from(request)))
}

#[utoipa::path(
    patch,
    path = "/guest-requests/{id}",
    tag = "guest-requests",
    summary = "Update guest request",
    params(("id" = String, Path, format = "uuid", description = "Guest request ID")),
    request_body = GuestRequestUpdate,
    responses(
        (status = 200, description = "Updated request", body = GuestRequestResponse),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_guest_request(
    State(state): State<AppState>,
    Path(id): Path<GuestRequestId>,
    _: RequiresPermission<resource::GuestRequests, operation::UpdateAll>,
    Json(update): Json<GuestRequestUpdate>,
) -> Result<Json<GuestRequestResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    GuestRequests::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| request_not_found(id))?;
    ensure_catalog_refs(&mut conn, update.service_id, update.category_id).await?;

    let request = GuestRequests::new(&mut conn)
        .update(
            id,
            &GuestRequestUpdateDBRequest {
                service_id: update.service_id,
                category_id: update.category_id,
                status: update.status,
            },
        )
        .await?;
    Ok(Json(GuestRequestResponse::from(request)))
}

#[utoipa::path(
    delete,
    path = "/guest-requests/{id}",
    tag = "guest-requests",
    summary = "Delete guest request",
    params(("id" = String, Path, format = "uuid", description = "Guest request ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_guest_request(
    State(state): State<AppState>,
    Path(id): Path<GuestRequestId>,
    _: RequiresPermission<resource::GuestRequests, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !GuestRequests::new(&mut conn).delete(id).await? {
        return Err(request_not_found(id));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/guest-requests/{id}/approve",
    tag = "guest-requests",
    summary = "Approve guest request",
    description = "Ensures the guest has a user account, gives that user a profile for the \
                   requested service and resolves the request.",
    params(("id" = String, Path, format = "uuid", description = "Guest request ID")),
    responses(
        (status = 200, description = "Approval report", body = ApprovalReport),
        (status = 404, description = "Not found"),
        (status = 409, description = "Request already resolved"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn approve_guest_request(
    State(state): State<AppState>,
    Path(id): Path<GuestRequestId>,
    _: RequiresPermission<resource::GuestRequests, operation::UpdateAll>,
) -> Result<Json<ApprovalReport>> {
    let report = Approvals::new(&state.db, &state.config, &state.email).approve_request(id).await?;
    Ok(Json(report))
}

#[cfg(all(test, feature = "live-db-tests"))]
mod tests {
    use crate::api::models::approvals::{ApprovalReport, ApprovalStepName, StepOutcome};
    use crate::api::models::guests::GuestRequestResponse;
    use crate::api::models::roles::ADMIN;
    use crate::db::models::guest_requests::RequestStatus;
    use crate::test_utils::{bearer, create_test_app, create_test_guest, create_test_service, create_test_user};
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;
    use uuid::Uuid;

    #[sqlx::test]
    #[test_log::test]
    async fn test_request_then_approve(pool: PgPool) {
        let (server, _bg, _dir) = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, ADMIN).await;
        let guest = create_test_guest(&pool).await;
        let service = create_test_service(&pool).await;

        let created = server
            .post("/api/v0.1/guest-requests")
            .json(&json!({"guestId": guest.id, "serviceId": service.id}))
            .await;
        created.assert_status(StatusCode::CREATED);
        let request: GuestRequestResponse = created.json();
        assert_eq!(request.status, RequestStatus::Pending);

        let report: ApprovalReport = server
            .post(&format!("/api/v0.1/guest-requests/{}/approve", request.request_id))
            .add_header("authorization", bearer(&admin))
            .await
            .json();
        assert!(report.profile_id.is_some());
        assert_eq!(report.outcome_of(ApprovalStepName::ResolveRequest), Some(StepOutcome::Succeeded));

        let resolved: GuestRequestResponse = server
            .get(&format!("/api/v0.1/guest-requests/{}", request.request_id))
            .add_header("authorization", bearer(&admin))
            .await
            .json();
        assert_eq!(resolved.status, RequestStatus::Resolved);
        assert!(resolved.resolved_at.is_some());

        server
            .post(&format!("/api/v0.1/guest-requests/{}/approve", request.request_id))
            .add_header("authorization", bearer(&admin))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unknown_service_is_not_found(pool: PgPool) {
        let (server, _bg, _dir) = create_test_app(pool.clone()).await;
        let guest = create_test_guest(&pool).await;

        server
            .post("/api/v0.1/guest-requests")
            .json(&json!({"guestId": guest.id, "serviceId": Uuid::new_v4()}))
            .await
            .assert_status_not_found();
    }
}
