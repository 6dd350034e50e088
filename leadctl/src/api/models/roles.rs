use super::pagination::Pagination;
use crate::db::models::roles::RoleDBResponse;
use crate::types::RoleId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

pub const SUPER_ADMIN: &str = "SUPER_ADMIN";
pub const ADMIN: &str = "ADMIN";
pub const USER: &str = "USER";

/// Roles seeded at startup. They cannot be renamed or deleted.
pub const SYSTEM_ROLES: [(&str, &str); 3] = [
    (SUPER_ADMIN, "Full access, including role management"),
    (ADMIN, "Manages guests, catalog, careers and every profile"),
    (USER, "Works inside their own profiles"),
];

pub fn is_system_role(name: &str) -> bool {
    SYSTEM_ROLES.iter().any(|(system, _)| *system == name)
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleCreate {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleResponse {
    #[schema(value_type = String, format = "uuid")]
    pub role_id: RoleId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListRolesQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}

impl From<RoleDBResponse> for RoleResponse {
    fn from(db: RoleDBResponse) -> Self {
        Self {
            role_id: db.id,
            name: db.name,
            description: db.description,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Role names are stored upper-case with underscores.
pub fn normalize_role_name(name: &str) -> String {
    name.trim().to_ascii_uppercase().replace([' ', '-'], "_")
}
