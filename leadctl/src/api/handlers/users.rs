//! User account management.
//!
//! Administrators manage every account. A standard user may read and update
//! their own account, but not their verification flag or roles.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::{
        normalize_email,
        pagination::PaginatedResponse,
        roles::{SUPER_ADMIN, USER, normalize_role_name},
        users::{CurrentUser, ListUsersQuery, UserCreate, UserResponse, UserUpdate},
    },
    auth::{
        password::{Argon2Params, hash_password_blocking, validate_password},
        permissions::{RequiresPermission, operation, require_permission, resource},
    },
    db::{
        handlers::{
            Repository, Users,
            attachments::{self, UploadOwner},
            users::UserFilter,
        },
        models::users::{UserCreateDBRequest, UserUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{Operation, Resource, UserId},
};

fn user_not_found(id: UserId) -> Error {
    Error::NotFound {
        resource: "User".to_string(),
        id: id.to_string(),
    }
}

/// Only a super admin may hand out the super admin role.
pub(crate) fn ensure_can_grant(current_user: &CurrentUser, roles: &[String]) -> Result<()> {
    if roles.iter().any(|r| r == SUPER_ADMIN) && !current_user.is_super_admin() {
        return Err(Error::InsufficientPermissions {
            required: crate::types::Permission::Allow(Resource::Roles, Operation::UpdateAll),
            action: Operation::UpdateAll,
            resource: SUPER_ADMIN.to_string(),
        });
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    summary = "List users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Page of users", body = PaginatedResponse<UserResponse>),
        (status = 403, description = "Admin only"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
    _: RequiresPermission<resource::Users, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<UserResponse>>> {
    let filter = UserFilter {
        email: query.email.as_deref().map(normalize_email),
        role: query.role.as_deref().map(normalize_role_name),
        is_verified: query.is_verified,
        offset: query.pagination.offset(),
        limit: query.pagination.limit(),
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut conn);
    let users = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        users.into_iter().map(UserResponse::from).collect(),
        total,
        &query.pagination,
    )))
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    summary = "Create user",
    request_body = UserCreate,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid password or unknown role"),
        (status = 409, description = "Email already registered"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_user(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Users, operation::CreateAll>,
    Json(create): Json<UserCreate>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let email = normalize_email(&create.email);
    if email.is_empty() {
        return Err(Error::BadRequest {
            message: "email is required".to_string(),
        });
    }
    validate_password(&create.password, &state.config.auth.password)?;

    let roles = match create.roles {
        Some(roles) if !roles.is_empty() => roles.iter().map(|r| normalize_role_name(r)).collect(),
        _ => vec![USER.to_string()],
    };
    ensure_can_grant(&current_user, &roles)?;

    let password_hash = hash_password_blocking(create.password, Argon2Params::from(&state.config.auth.password)).await?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            company_name: create.company_name,
            contact_name: create.contact_name,
            email,
            phone: create.phone,
            password_hash,
            is_verified: create.is_verified,
            roles,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    summary = "Get user",
    params(("id" = String, Path, format = "uuid", description = "User ID")),
    responses(
        (status = 200, description = "User", body = UserResponse),
        (status = 403, description = "Not your account"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    current_user: RequiresPermission<resource::Users, operation::ReadOwn>,
) -> Result<Json<UserResponse>> {
    if current_user.id != id {
        require_permission(&current_user, Resource::Users, Operation::ReadAll)?;
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn).get_by_id(id).await?.ok_or_else(|| user_not_found(id))?;
    Ok(Json(UserResponse::from(user)))
}

#[utoipa::path(
    patch,
    path = "/users/{id}",
    tag = "users",
    summary = "Update user",
    params(("id" = String, Path, format = "uuid", description = "User ID")),
    request_body = UserUpdate,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 403, description = "Not your account, or an admin-only field"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    current_user: RequiresPermission<resource::Users, operation::UpdateOwn>,
    Json(update): Json<UserUpdate>,
) -> Result<Json<UserResponse>> {
    if current_user.id != id || update.is_verified.is_some() {
        require_permission(&current_user, Resource::Users, Operation::UpdateAll)?;
    }

    let password_hash = match update.password {
        Some(password) => {
            validate_password(&password, &state.config.auth.password)?;
            Some(hash_password_blocking(password, Argon2Params::from(&state.config.auth.password)).await?)
        }
        None => None,
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut conn);
    repo.get_by_id(id).await?.ok_or_else(|| user_not_found(id))?;
    let user = repo
        .update(
            id,
            &UserUpdateDBRequest {
                company_name: update.company_name,
                contact_name: update.contact_name,
                phone: update.phone,
                password_hash,
                is_verified: update.is_verified,
            },
        )
        .await?;

    Ok(Json(UserResponse::from(user)))
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    summary = "Delete user",
    params(("id" = String, Path, format = "uuid", description = "User ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 400, description = "Cannot delete yourself"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    current_user: RequiresPermission<resource::Users, operation::DeleteAll>,
) -> Result<StatusCode> {
    if current_user.id == id {
        return Err(Error::BadRequest {
            message: "You cannot delete your own account".to_string(),
        });
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let orphaned = attachments::orphaned_by(&mut tx, UploadOwner::User(id)).await?;
    if !Users::new(&mut tx).delete(id).await? {
        return Err(user_not_found(id));
    }
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    state.uploads.remove_all_in_background(orphaned);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(all(test, feature = "live-db-tests"))]
mod tests {
    use crate::api::models::pagination::PaginatedResponse;
    use crate::api::models::roles::{ADMIN, USER};
    use crate::api::models::users::UserResponse;
    use crate::test_utils::{bearer, create_test_app, create_test_user};
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_admin_creates_and_filters_users(pool: PgPool) {
        let (server, _bg, _dir) = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, ADMIN).await;

        let body = json!({
            "companyName": "Globex",
            "contactName": "Hank",
            "email": "Hank@Globex.example",
            "password": "correct-horse-battery"
        });
        let created = server.post("/api/v0.1/users").add_header("authorization", bearer(&admin)).json(&body).await;
        created.assert_status(StatusCode::CREATED);
        let created: UserResponse = created.json();
        assert_eq!(created.email, "hank@globex.example");
        assert_eq!(created.roles, vec![USER.to_string()]);

        server
            .post("/api/v0.1/users")
            .add_header("authorization", bearer(&admin))
            .json(&body)
            .await
            .assert_status(StatusCode::CONFLICT);

        let page: PaginatedResponse<UserResponse> = server
            .get("/api/v0.1/users")
            .add_query_param("email", "hank@globex.example")
            .add_header("authorization", bearer(&admin))
            .await
            .json();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].user_id, created.user_id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_user_can_only_touch_self(pool: PgPool) {
        let (server, _bg, _dir) = create_test_app(pool.clone()).await;
        let alice = create_test_user(&pool, USER).await;
        let bob = create_test_user(&pool, USER).await;

        server
            .get(&format!("/api/v0.1/users/{}", alice.id))
            .add_header("authorization", bearer(&alice))
            .await
            .assert_status_ok();
        server
            .get(&format!("/api/v0.1/users/{}", bob.id))
            .add_header("authorization", bearer(&alice))
            .await
            .assert_status_forbidden();

        let updated: UserResponse = server
            .patch(&format!("/api/v0.1/users/{}", alice.id))
            .add_header("authorization", bearer(&alice))
            .json(&json!({"contactName": "Alice Liddell"}))
            .await
            .json();
        assert_eq!(updated.contact_name, "Alice Liddell");

        server
            .patch(&format!("/api/v0.1/users/{}", alice.id))
            .add_header("authorization", bearer(&alice))
            .json(&json!({"isVerified": true}))
            .await
            .assert_status_forbidden();

        server.get("/api/v0.1/users").add_header("authorization", bearer(&alice)).await.assert_status_forbidden();
    }
}
