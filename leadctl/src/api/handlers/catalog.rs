//! The service catalog: services and the categories they belong to.
//!
//! Reads are public so the intake form can list what is on offer. Mutations
//! are restricted to administrators.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::{
        catalog::{
            CategoryCreate, CategoryResponse, CategoryUpdate, ListCategoriesQuery, ListServicesQuery, ServiceCategoriesUpdate,
            ServiceCreate, ServiceResponse, ServiceUpdate,
        },
        pagination::PaginatedResponse,
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{
            Categories, Repository, Services,
            catalog::{CategoryFilter, ServiceFilter},
        },
        models::catalog::{CategoryCreateDBRequest, CategoryUpdateDBRequest, ServiceCreateDBRequest, ServiceUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{CategoryId, ServiceId},
};

fn service_not_found(id: ServiceId) -> Error {
    Error::NotFound {
        resource: "Service".to_string(),
        id: id.to_string(),
    }
}

fn category_not_found(id: CategoryId) -> Error {
    Error::NotFound {
        resource: "Category".to_string(),
        id: id.to_string(),
    }
}

fn require_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::BadRequest {
            message: "name is required".to_string(),
        });
    }
    Ok(name.to_string())
}

#[utoipa::path(
    get,
    path = "/services",
    tag = "catalog",
    summary = "List services",
    params(ListServicesQuery),
    responses((status = 200, description = "Page of services", body = PaginatedResponse<ServiceResponse>))
)]
#[tracing::instrument(skip_all)]
pub async fn list_services(
    State(state): State<AppState>,
    Query(query): Query<ListServicesQuery>,
) -> Result<Json<PaginatedResponse<ServiceResponse>>> {
    let filter = ServiceFilter {
        name: query.name,
        category_id: query.category_id,
        offset: query.pagination.offset(),
        limit: query.pagination.limit(),
    };
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Services::new(&mut conn);
    let services = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;
    Ok(Json(PaginatedResponse::new(
        services.into_iter().map(ServiceResponse::from).collect(),
        total,
        &query.pagination,
    )))
}

#[utoipa::path(
    get,
    path = "/services/{id}",
    tag = "catalog",
    summary = "Get service",
    params(("id" = String, Path, format = "uuid", description = "Service ID")),
    responses(
        (status = 200, description = "Service", body = ServiceResponse),
        (status = 404, description = "Not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_service(State(state): State<AppState>, Path(id): Path<ServiceId>) -> Result<Json<ServiceResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let service = Services::new(&mut conn).get_by_id(id).await?.ok_or_else(|| service_not_found(id))?;
    Ok(Json(ServiceResponse::from(service)))
}

#[utoipa::path(
    post,
    path = "/services",
    tag = "catalog",
    summary = "Create service",
    request_body = ServiceCreate,
    responses(
        (status = 201, description = "Service created", body = ServiceResponse),
        (status = 409, description = "Name taken"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_service(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Catalog, operation::CreateAll>,
    Json(create): Json<ServiceCreate>,
) -> Result<(StatusCode, Json<ServiceResponse>)> {
    let name = require_name(&create.name)?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let service = Services::new(&mut conn)
        .create(&ServiceCreateDBRequest {
            name,
            description: create.description,
            category_ids: create.category_ids,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(ServiceResponse::from(service))))
}

#[utoipa::path(
    patch,
    path = "/services/{id}",
    tag = "catalog",
    summary = "Update service",
    params(("id" = String, Path, format = "uuid", description = "Service ID")),
    request_body = ServiceUpdate,
    responses(
        (status = 200, description = "Updated service", body = ServiceResponse),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_service(
    State(state): State<AppState>,
    Path(id): Path<ServiceId>,
    _: RequiresPermission<resource::Catalog, operation::UpdateAll>,
    Json(update): Json<ServiceUpdate>,
) -> Result<Json<ServiceResponse>> {
    let name = update.name.as_deref().map(require_name).transpose()?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Services::new(&mut conn);
    repo.get_by_id(id).await?.ok_or_else(|| service_not_found(id))?;
    let service = repo
        .update(
            id,
            &ServiceUpdateDBRequest {
                name,
                description: update.description,
            },
        )
        .await?;
    Ok(Json(ServiceResponse::from(service)))
}

#[utoipa::path(
    put,
    path = "/services/{id}/categories",
    tag = "catalog",
    summary = "Replace a service's categories",
    params(("id" = String, Path, format = "uuid", description = "Service ID")),
    request_body = ServiceCategoriesUpdate,
    responses(
        (status = 200, description = "Service with its new categories", body = ServiceResponse),
        (status = 400, description = "Unknown category"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn set_service_categories(
    State(state): State<AppState>,
    Path(id): Path<ServiceId>,
    _: RequiresPermission<resource::Catalog, operation::UpdateAll>,
    Json(update): Json<ServiceCategoriesUpdate>,
) -> Result<Json<ServiceResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let service = Services::new(&mut conn).set_categories(id, &update.category_ids).await?;
    Ok(Json(ServiceResponse::from(service)))
}

#[utoipa::path(
    delete,
    path = "/services/{id}",
    tag = "catalog",
    summary = "Delete service",
    params(("id" = String, Path, format = "uuid", description = "Service ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_service(
    State(state): State<AppState>,
    Path(id): Path<ServiceId>,
    _: RequiresPermission<resource::Catalog, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !Services::new(&mut conn).delete(id).await? {
        return Err(service_not_found(id));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/categories",
    tag = "catalog",
    summary = "List categories",
    params(ListCategoriesQuery),
    responses((status = 200, description = "Page of categories", body = PaginatedResponse<CategoryResponse>))
)]
#[tracing::instrument(skip_all)]
pub async fn list_categories(
    State(state): State<AppState>,
    Query(query): Query<ListCategoriesQuery>,
) -> Result<Json<PaginatedResponse<CategoryResponse>>> {
    let filter = CategoryFilter {
        name: query.name,
        offset: query.pagination.offset(),
        limit: query.pagination.limit(),
    };
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Categories::new(&mut conn);
    let categories = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;
    Ok(Json(PaginatedResponse::new(
        categories.into_iter().map(CategoryResponse::from).collect(),
        total,
        &query.pagination,
    )))
}

#[utoipa::path(
    get,
    path = "/categories/{id}",
    tag = "catalog",
    summary = "Get category",
    params(("id" = String, Path, format = "uuid", description = "Category ID")),
    responses(
        (status = 200, description = "Category", body = CategoryResponse),
        (status = 404, description = "Not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_category(State(state): State<AppState>, Path(id): Path<CategoryId>) -> Result<Json<CategoryResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let category = Categories::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| category_not_found(id))?;
    Ok(Json(CategoryResponse::from(category)))
}

#[utoipa::path(
    post,
    path = "/categories",
    tag = "catalog",
    summary = "Create category",
    request_body = CategoryCreate,
    responses(
        (status = 201, description = "Category created", body = CategoryResponse),
        (status = 409, description = "Name taken"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_category(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Catalog, operation::CreateAll>,
    Json(create): Json<CategoryCreate>,
) -> Result<(StatusCode, Json<CategoryResponse>)> {
    let name = require_name(&create.name)?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let category = Categories::new(&mut conn)
        .create(&CategoryCreateDBRequest {
            name,
            description: create.description,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(CategoryResponse::from(category))))
}

#[utoipa::path(
    patch,
    path = "/categories/{id}",
    tag = "catalog",
    summary = "Update category",
    params(("id" = String, Path, format = "uuid", description = "Category ID")),
    request_body = CategoryUpdate,
    responses(
        (status = 200, description = "Updated category", body = CategoryResponse),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
    _: RequiresPermission<resource::Catalog, operation::UpdateAll>,
    Json(update): Json<CategoryUpdate>,
) -> Result<Json<CategoryResponse>> {
    let name = update.name.as_deref().map(require_name).transpose()?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Categories::new(&mut conn);
    repo.get_by_id(id).await?.ok_or_else(|| category_not_found(id))?;
    let category = repo
        .update(
            id,
            &CategoryUpdateDBRequest {
                name,
                description: update.description,
            },
        )
        .await?;
    Ok(Json(CategoryResponse::from(category)))
}

#[utoipa::path(
    delete,
    path = "/categories/{id}",
    tag = "catalog",
    summary = "Delete category",
    params(("id" = String, Path, format = "uuid", description = "Category ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
    _: RequiresPermission<resource::Catalog, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !Categories::new(&mut conn).delete(id).await? {
        return Err(category_not_found(id));
    }
    Ok(StatusCode::NO_CONTENT)
}
