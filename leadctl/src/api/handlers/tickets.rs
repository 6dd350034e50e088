//! Support tickets raised from inside a profile.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use sqlx::PgConnection;

use super::uploads::UploadForm;
use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        tickets::{ListTicketsQuery, TicketCreate, TicketResponse, TicketUpdate},
        users::CurrentUser,
    },
    auth::permissions::{RequiresPermission, ensure_profile_access, operation, require_profile_filter, resource},
    db::{
        handlers::{Repository, Tickets, tickets::TicketFilter},
        models::tickets::{TicketCreateDBRequest, TicketDBResponse, TicketUpdateDBRequest},
    },
    errors::{Error, Result},
    storage::UploadArea,
    types::TicketId,
};

async fn accessible_ticket(conn: &mut PgConnection, user: &CurrentUser, id: TicketId) -> Result<TicketDBResponse> {
    let ticket = Tickets::new(&mut *conn).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Ticket".to_string(),
        id: id.to_string(),
    })?;
    ensure_profile_access(conn, user, ticket.profile_id).await?;
    Ok(ticket)
}

#[utoipa::path(
    get,
    path = "/tickets",
    tag = "tickets",
    summary = "List tickets",
    params(ListTicketsQuery),
    responses((status = 200, description = "Page of tickets", body = PaginatedResponse<TicketResponse>)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_tickets(
    State(state): State<AppState>,
    Query(query): Query<ListTicketsQuery>,
    current_user: RequiresPermission<resource::Tickets, operation::ReadOwn>,
) -> Result<Json<PaginatedResponse<TicketResponse>>> {
    let profile_id = require_profile_filter(&current_user, query.profile_id)?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if let Some(profile_id) = profile_id {
        ensure_profile_access(&mut conn, &current_user, profile_id).await?;
    }

    let filter = TicketFilter {
        profile_id,
        user_id: query.user_id,
        status: query.status,
        priority: query.priority,
        offset: query.pagination.offset(),
        limit: query.pagination.limit(),
    };
    let mut repo = Tickets::new(&mut conn);
    let tickets = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;
    Ok(Json(PaginatedResponse::new(
        tickets.into_iter().map(TicketResponse::from).collect(),
        total,
        &query.pagination,
    )))
}

async fn insert_ticket(state: &AppState, user: &CurrentUser, form: &UploadForm) -> Result<TicketDBResponse> {
    let create: TicketCreate = form.parse()?;
    if create.subject.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "subject is required".to_string(),
        });
    }
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    ensure_profile_access(&mut conn, user, create.profile_id).await?;
    let ticket = Tickets::new(&mut conn)
        .create(&TicketCreateDBRequest {
            profile_id: create.profile_id,
            user_id: user.id,
            subject: create.subject,
            description: create.description,
            priority: create.priority,
            document_path: form.document_path(),
        })
        .await?;
    Ok(ticket)
}

#[utoipa::path(
    post,
    path = "/tickets",
    tag = "tickets",
    summary = "Open ticket",
    description = "Multipart form with the ticket fields and an optional `file`.",
    request_body(content = TicketCreate, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Ticket opened", body = TicketResponse),
        (status = 413, description = "File too large"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_ticket(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Tickets, operation::CreateOwn>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<TicketResponse>)> {
    let mut form = UploadForm::read(&state.uploads, UploadArea::Tickets, multipart).await?;
    let result = insert_ticket(&state, &current_user, &form).await;
    let ticket = form.settle(&state.uploads, result)?;
    Ok((StatusCode::CREATED, Json(TicketResponse::from(ticket))))
}

#[utoipa::path(
    get,
    path = "/tickets/{id}",
    tag = "tickets",
    summary = "Get ticket",
    params(("id" = String, Path, format = "uuid", description = "Ticket ID")),
    responses(
        (status = 200, description = "Ticket", body = TicketResponse),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_ticket(
    State(state): State<AppState>,
    Path(id): Path<TicketId>,
    current_user: RequiresPermission<resource::Tickets, operation::ReadOwn>,
) -> Result<Json<TicketResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let ticket = accessible_ticket(&mut conn, &current_user, id).await?;
    Ok(Json(TicketResponse::from(ticket)))
}

#[utoipa::path(
    patch,
    path = "/tickets/{id}",
    tag = "tickets",
    summary = "Update ticket",
    params(("id" = String, Path, format = "uuid", description = "Ticket ID")),
    request_body = TicketUpdate,
    responses(
        (status = 200, description = "Updated ticket", body = TicketResponse),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_ticket(
    State(state): State<AppState>,
    Path(id): Path<TicketId>,
    current_user: RequiresPermission<resource::Tickets, operation::UpdateOwn>,
    Json(update): Json<TicketUpdate>,
) -> Result<Json<TicketResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    accessible_ticket(&mut conn, &current_user, id).await?;
    let ticket = Tickets::new(&mut conn)
        .update(
            id,
            &TicketUpdateDBRequest {
                subject: update.subject,
                description: update.description,
                status: update.status,
                priority: update.priority,
            },
        )
        .await?;
    Ok(Json(TicketResponse::from(ticket)))
}

#[utoipa::path(
    delete,
    path = "/tickets/{id}",
    tag = "tickets",
    summary = "Delete ticket",
    description = "The attached file is removed in the background; a failure there does not fail the request.",
    params(("id" = String, Path, format = "uuid", description = "Ticket ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_ticket(
    State(state): State<AppState>,
    Path(id): Path<TicketId>,
    current_user: RequiresPermission<resource::Tickets, operation::DeleteOwn>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let ticket = accessible_ticket(&mut conn, &current_user, id).await?;
    Tickets::new(&mut conn).delete(id).await?;
    if let Some(path) = ticket.document_path {
        state.uploads.remove_in_background(path);
    }
    Ok(StatusCode::NO_CONTENT)
}
