//! API request/response models for services and categories.

use super::pagination::Pagination;
use crate::db::models::catalog::{CategoryDBResponse, ServiceDBResponse};
use crate::types::{CategoryId, ServiceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCreate {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    #[schema(value_type = Vec<String>)]
    pub category_ids: Vec<CategoryId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Replaces every category link of a service
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCategoriesUpdate {
    #[schema(value_type = Vec<String>)]
    pub category_ids: Vec<CategoryId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceResponse {
    #[schema(value_type = String, format = "uuid")]
    pub service_id: ServiceId,
    pub name: String,
    pub description: Option<String>,
    #[schema(value_type = Vec<String>)]
    pub category_ids: Vec<CategoryId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListServicesQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    pub name: Option<String>,
    #[param(value_type = Option<String>, format = "uuid")]
    pub category_id: Option<CategoryId>,
}

impl From<ServiceDBResponse> for ServiceResponse {
    fn from(db: ServiceDBResponse) -> Self {
        Self {
            service_id: db.id,
            name: db.name,
            description: db.description,
            category_ids: db.category_ids,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCreate {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResponse {
    #[schema(value_type = String, format = "uuid")]
    pub category_id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListCategoriesQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    pub name: Option<String>,
}

impl From<CategoryDBResponse> for CategoryResponse {
    fn from(db: CategoryDBResponse) -> Self {
        Self {
            category_id: db.id,
            name: db.name,
            description: db.description,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
