//! Role management and role assignment.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use super::users::ensure_can_grant;
use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        roles::{ListRolesQuery, RoleCreate, RoleResponse, RoleUpdate, normalize_role_name},
        users::{UserResponse, UserRolesUpdate},
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{Repository, Roles, Users, roles::RoleFilter},
        models::roles::{RoleCreateDBRequest, RoleUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{RoleId, UserId},
};

fn role_not_found(id: RoleId) -> Error {
    Error::NotFound {
        resource: "Role".to_string(),
        id: id.to_string(),
    }
}

#[utoipa::path(
    get,
    path = "/roles",
    tag = "roles",
    summary = "List roles",
    params(ListRolesQuery),
    responses((status = 200, description = "Page of roles", body = PaginatedResponse<RoleResponse>)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_roles(
    State(state): State<AppState>,
    Query(query): Query<ListRolesQuery>,
    _: RequiresPermission<resource::Roles, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<RoleResponse>>> {
    let filter = RoleFilter {
        offset: query.pagination.offset(),
        limit: query.pagination.limit(),
    };
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Roles::new(&mut conn);
    let roles = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;
    Ok(Json(PaginatedResponse::new(
        roles.into_iter().map(RoleResponse::from).collect(),
        total,
        &query.pagination,
    )))
}

#[utoipa::path(
    post,
    path = "/roles",
    tag = "roles",
    summary = "Create role",
    request_body = RoleCreate,
    responses(
        (status = 201, description = "Role created", body = RoleResponse),
        (status = 409, description = "Role name taken"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_role(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Roles, operation::CreateAll>,
    Json(create): Json<RoleCreate>,
) -> Result<(StatusCode, Json<RoleResponse>)> {
    let name = normalize_role_name(&create.name);
    if name.is_empty() {
        return Err(Error::BadRequest {
            message: "name is required".to_string(),
        });
    }
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let role = Roles::new(&mut conn)
        .create(&RoleCreateDBRequest {
            name,
            description: create.description,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(RoleResponse::from(role))))
}

#[utoipa::path(
    get,
    path = "/roles/{id}",
    tag = "roles",
    summary = "Get role",
    params(("id" = String, Path, format = "uuid", description = "Role ID")),
    responses(
        (status = 200, description = "Role", body = RoleResponse),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_role(
    State(state): State<AppState>,
    Path(id): Path<RoleId>,
    _: RequiresPermission<resource::Roles, operation::ReadAll>,
) -> Result<Json<RoleResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let role = Roles::new(&mut conn).get_by_id(id).await?.ok_or_else(|| role_not_found(id))?;
    Ok(Json(RoleResponse::from(role)))
}

#[utoipa::path(
    patch,
    path = "/roles/{id}",
    tag = "roles",
    summary = "Update role",
    description = "System roles cannot be renamed.",
    params(("id" = String, Path, format = "uuid", description = "Role ID")),
    request_body = RoleUpdate,
    responses(
        (status = 200, description = "Updated role", body = RoleResponse),
        (status = 403, description = "System role"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_role(
    State(state): State<AppState>,
    Path(id): Path<RoleId>,
    _: RequiresPermission<resource::Roles, operation::UpdateAll>,
    Json(update): Json<RoleUpdate>,
) -> Result<Json<RoleResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Roles::new(&mut conn);
    repo.get_by_id(id).await?.ok_or_else(|| role_not_found(id))?;
    let role = repo
        .update(
            id,
            &RoleUpdateDBRequest {
                name: update.name.as_deref().map(normalize_role_name),
                description: update.description,
            },
        )
        .await?;
    Ok(Json(RoleResponse::from(role)))
}

#[utoipa::path(
    delete,
    path = "/roles/{id}",
    tag = "roles",
    summary = "Delete role",
    params(("id" = String, Path, format = "uuid", description = "Role ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "System role"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_role(
    State(state): State<AppState>,
    Path(id): Path<RoleId>,
    _: RequiresPermission<resource::Roles, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !Roles::new(&mut conn).delete(id).await? {
        return Err(role_not_found(id));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/users/{id}/roles",
    tag = "roles",
    summary = "Replace a user's roles",
    params(("id" = String, Path, format = "uuid", description = "User ID")),
    request_body = UserRolesUpdate,
    responses(
        (status = 200, description = "User with new roles", body = UserResponse),
        (status = 400, description = "Unknown role or empty list"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn set_user_roles(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    current_user: RequiresPermission<resource::Roles, operation::UpdateAll>,
    Json(update): Json<UserRolesUpdate>,
) -> Result<Json<UserResponse>> {
    let roles: Vec<String> = update.roles.iter().map(|r| normalize_role_name(r)).collect();
    if roles.is_empty() {
        return Err(Error::BadRequest {
            message: "A user needs at least one role".to_string(),
        });
    }
    ensure_can_grant(&current_user, &roles)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut conn);
    repo.get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "User".to_string(),
        id: id.to_string(),
    })?;
    let user = repo.set_roles(id, &roles).await?;
    Ok(Json(UserResponse::from(user)))
}

#[cfg(all(test, feature = "live-db-tests"))]
mod tests {
    use crate::api::models::roles::{ADMIN, RoleResponse, SUPER_ADMIN, USER};
    use crate::api::models::users::UserResponse;
    use crate::test_utils::{bearer, create_test_app, create_test_user};
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_custom_role_lifecycle_and_assignment(pool: PgPool) {
        let (server, _bg, _dir) = create_test_app(pool.clone()).await;
        let root = create_test_user(&pool, SUPER_ADMIN).await;
        let member = create_test_user(&pool, USER).await;

        let created = server
            .post("/api/v0.1/roles")
            .add_header("authorization", bearer(&root))
            .json(&json!({"name": "sales manager"}))
            .await;
        created.assert_status(StatusCode::CREATED);
        let role: RoleResponse = created.json();
        assert_eq!(role.name, "SALES_MANAGER");

        let user: UserResponse = server
            .put(&format!("/api/v0.1/users/{}/roles", member.id))
            .add_header("authorization", bearer(&root))
            .json(&json!({"roles": ["USER", "sales_manager"]}))
            .await
            .json();
        assert_eq!(user.roles, vec!["SALES_MANAGER".to_string(), USER.to_string()]);

        server
            .put(&format!("/api/v0.1/users/{}/roles", member.id))
            .add_header("authorization", bearer(&root))
            .json(&json!({"roles": ["NO_SUCH_ROLE"]}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        server
            .delete(&format!("/api/v0.1/roles/{}", role.role_id))
            .add_header("authorization", bearer(&root))
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_admin_cannot_grant_super_admin(pool: PgPool) {
        let (server, _bg, _dir) = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, ADMIN).await;
        let member = create_test_user(&pool, USER).await;

        server
            .put(&format!("/api/v0.1/users/{}/roles", member.id))
            .add_header("authorization", bearer(&admin))
            .json(&json!({"roles": ["SUPER_ADMIN"]}))
            .await
            .assert_status_forbidden();
    }
}
