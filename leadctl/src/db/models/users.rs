//! Database models for users.

use crate::types::UserId;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub company_name: String,
    pub contact_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub is_verified: bool,
    /// Role names, resolved against the `roles` table
    pub roles: Vec<String>,
}

/// Database request for updating a user; `None` keeps the stored value
#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub company_name: Option<String>,
    pub contact_name: Option<String>,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
    pub is_verified: Option<bool>,
}

/// Database response for a user, roles included
#[derive(Debug, Clone, FromRow)]
pub struct UserDBResponse {
    pub id: UserId,
    pub company_name: String,
    pub contact_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub is_verified: bool,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
