//! Database models for persisted refresh tokens.

use crate::types::{RefreshTokenId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Only the sha256 of the token is stored; the raw value is handed to the client once.
#[derive(Debug, Clone)]
pub struct RefreshTokenCreateDBRequest {
    pub user_id: UserId,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct RefreshTokenDBResponse {
    pub id: RefreshTokenId,
    pub user_id: UserId,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenDBResponse {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}
