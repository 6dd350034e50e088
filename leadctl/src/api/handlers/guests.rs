//! Guest intake and approval.
//!
//! Anyone may register as a guest. Everything else, including approval, is
//! restricted to administrators.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::{
        approvals::ApprovalReport,
        guests::{GuestCreate, GuestResponse, GuestUpdate, ListGuestsQuery},
        normalize_email,
        pagination::PaginatedResponse,
    },
    approvals::Approvals,
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{Guests, Repository, guests::GuestFilter},
        models::guests::{GuestCreateDBRequest, GuestUpdateDBRequest},
    },
    errors::{Error, Result},
    types::GuestId,
};

fn guest_not_found(id: GuestId) -> Error {
    Error::NotFound {
        resource: "Guest".to_string(),
        id: id.to_string(),
    }
}

fn required(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::BadRequest {
            message: format!("{field} is required"),
        });
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/guests",
    tag = "guests",
    summary = "Register as a guest",
    request_body = GuestCreate,
    responses(
        (status = 201, description = "Guest registered", body = GuestResponse),
        (status = 400, description = "Missing field"),
        (status = 409, description = "Email already registered"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_guest(State(state): State<AppState>, Json(create): Json<GuestCreate>) -> Result<(StatusCode, Json<GuestResponse>)> {
    required("companyName", &create.company_name)?;
    required("contactName", &create.contact_name)?;
    let email = normalize_email(&create.email);
    required("email", &email)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let guest = Guests::new(&mut conn)
        .create(&GuestCreateDBRequest {
            company_name: create.company_name,
            contact_name: create.contact_name,
            email,
            phone: create.phone,
            message: create.message,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(GuestResponse::from(guest))))
}

#[utoipa::path(
    get,
    path = "/guests",
    tag = "guests",
    summary = "List guests",
    params(ListGuestsQuery),
    responses((status = 200, description = "Page of guests", body = PaginatedResponse<GuestResponse>)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_guests(
    State(state): State<AppState>,
    Query(query): Query<ListGuestsQuery>,
    _: RequiresPermission<resource::Guests, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<GuestResponse>>> {
    let filter = GuestFilter {
        email: query.email.as_deref().map(normalize_email),
        approved: query.approved,
        offset: query.pagination.offset(),
        limit: query.pagination.limit(),
    };
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Guests::new(&mut conn);
    let guests = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;
    Ok(Json(PaginatedResponse::new(
        guests.into_iter().map(GuestResponse::from).collect(),
        total,
        &query.pagination,
    )))
}

#[utoipa::path(
    get,
    path = "/guests/{id}",
    tag = "guests",
    summary = "Get guest",
    params(("id" = String, Path, format = "uuid", description = "Guest ID")),
    responses(
        (status = 200, description = "Guest", body = GuestResponse),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_guest(
    State(state): State<AppState>,
    Path(id): Path<GuestId>,
    _: RequiresPermission<resource::Guests, operation::ReadAll>,
) -> Result<Json<GuestResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let guest = Guests::new(&mut conn).get_by_id(id).await?.ok_or_else(|| guest_not_found(id))?;
    Ok(Json(GuestResponse::from(guest)))
}

#[utoipa::path(
    patch,
    path = "/guests/{id}",
    tag = "guests",
    summary = "Update guest",
    params(("id" = String, Path, format = "uuid", description = "Guest ID")),
    request_body = GuestUpdate,
    responses(
        (status = 200, description = "Updated guest", body = GuestResponse),
        (status = 404, description = "Not found"),
        (status = 409, description = "Email already registered"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_guest(
    State(state): State<AppState>,
    Path(id): Path<GuestId>,
    _: RequiresPermission<resource::Guests, operation::UpdateAll>,
    Json(update): Json<GuestUpdate>,
) -> Result<Json<GuestResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Guests::new(&mut conn);
    repo.get_by_id(id).await?.ok_or_else(|| guest_not_found(id))?;
    let guest = repo
        .update(
            id,
            &GuestUpdateDBRequest {
                company_name: update.company_name,
                contact_name: update.contact_name,
                email: update.email.as_deref().map(normalize_email),
                phone: update.phone,
                message: update.message,
            },
        )
        .await?;
    Ok(Json(GuestResponse::from(guest)))
}

#[utoipa::path(
    delete,
    path = "/guests/{id}",
    tag = "guests",
    summary = "Delete guest",
    description = "Also removes the guest's requests and appointments.",
    params(("id" = String, Path, format = "uuid", description = "Guest ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_guest(
    State(state): State<AppState>,
    Path(id): Path<GuestId>,
    _: RequiresPermission<resource::Guests, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !Guests::new(&mut conn).delete(id).await? {
        return Err(guest_not_found(id));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/guests/{id}/approve",
    tag = "guests",
    summary = "Approve guest",
    description = "Creates a user account for the guest and emails the generated credentials. \
                   A failed email is reported in the returned steps and does not undo the approval.",
    params(("id" = String, Path, format = "uuid", description = "Guest ID")),
    responses(
        (status = 200, description = "Approval report", body = ApprovalReport),
        (status = 404, description = "Not found"),
        (status = 409, description = "Guest already approved, or a user holds the email"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn approve_guest(
    State(state): State<AppState>,
    Path(id): Path<GuestId>,
    _: RequiresPermission<resource::Guests, operation::UpdateAll>,
) -> Result<Json<ApprovalReport>> {
    let report = Approvals::new(&state.db, &state.config, &state.email).approve_guest(id).await?;
    Ok(Json(report))
}

#[cfg(all(test, feature = "live-db-tests"))]
mod tests {
    use crate::api::models::guests::GuestResponse;
    use crate::api::models::pagination::PaginatedResponse;
    use crate::api::models::roles::{ADMIN, USER};
    use crate::api::models::users::UserResponse;
    use crate::test_utils::{bearer, create_test_app, create_test_user};
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    fn guest_body(email: &str) -> serde_json::Value {
        json!({
            "companyName": "Initech",
            "contactName": "Peter Gibbons",
            "email": email,
            "phone": "+1 555 0100",
        })
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_register_approve_and_find_user(pool: PgPool) {
        let (server, _bg, _dir) = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, ADMIN).await;

        let created = server.post("/api/v0.1/guests").json(&guest_body("a@b.com")).await;
        created.assert_status(StatusCode::CREATED);
        let guest: GuestResponse = created.json();
        assert!(!guest.approved);

        server
            .post("/api/v0.1/guests")
            .json(&guest_body("A@B.com"))
            .await
            .assert_status(StatusCode::CONFLICT);

        server
            .post(&format!("/api/v0.1/guests/{}/approve", guest.guest_id))
            .add_header("authorization", bearer(&admin))
            .await
            .assert_status_ok();

        let users: PaginatedResponse<UserResponse> = server
            .get("/api/v0.1/users")
            .add_query_param("email", "a@b.com")
            .add_header("authorization", bearer(&admin))
            .await
            .json();
        assert_eq!(users.total, 1);
        assert_eq!(users.items[0].email, "a@b.com");
        assert!(!users.items[0].is_verified);

        let again = server
            .post(&format!("/api/v0.1/guests/{}/approve", guest.guest_id))
            .add_header("authorization", bearer(&admin))
            .await;
        again.assert_status(StatusCode::CONFLICT);
        let body: serde_json::Value = again.json();
        assert_eq!(body["code"], "conflict");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_guest_listing_is_admin_only(pool: PgPool) {
        let (server, _bg, _dir) = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, USER).await;

        server.get("/api/v0.1/guests").await.assert_status_unauthorized();
        server
            .get("/api/v0.1/guests")
            .add_header("authorization", bearer(&user))
            .await
            .assert_status_forbidden();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_pagination_past_the_end(pool: PgPool) {
        let (server, _bg, _dir) = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, ADMIN).await;
        for i in 0..3 {
            server
                .post("/api/v0.1/guests")
                .json(&guest_body(&format!("guest{i}@example.com")))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let page: PaginatedResponse<GuestResponse> = server
            .get("/api/v0.1/guests")
            .add_query_param("limit", 2)
            .add_header("authorization", bearer(&admin))
            .await
            .json();
        assert_eq!(page.total, 3);
        assert_eq!(page.pages, 2);
        assert_eq!(page.items.len(), 2);

        let beyond: PaginatedResponse<GuestResponse> = server
            .get("/api/v0.1/guests")
            .add_query_param("offset", 50)
            .add_header("authorization", bearer(&admin))
            .await
            .json();
        assert_eq!(beyond.total, 3);
        assert!(beyond.items.is_empty());
    }
}
