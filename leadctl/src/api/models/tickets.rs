//! API request/response models for support tickets.

use super::pagination::Pagination;
use crate::db::models::tickets::{TicketDBResponse, TicketPriority, TicketStatus};
use crate::types::{ProfileId, TicketId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Text parts of the ticket upload form. The `document` part is optional.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TicketCreate {
    #[schema(value_type = String, format = "uuid")]
    pub profile_id: ProfileId,
    pub subject: String,
    pub description: Option<String>,
    pub priority: Option<TicketPriority>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TicketUpdate {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TicketResponse {
    #[schema(value_type = String, format = "uuid")]
    pub ticket_id: TicketId,
    #[schema(value_type = String, format = "uuid")]
    pub profile_id: ProfileId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub subject: String,
    pub description: Option<String>,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub document_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListTicketsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    #[param(value_type = Option<String>, format = "uuid")]
    pub profile_id: Option<ProfileId>,
    #[param(value_type = Option<String>, format = "uuid")]
    pub user_id: Option<UserId>,
    #[param(inline)]
    pub status: Option<TicketStatus>,
    #[param(inline)]
    pub priority: Option<TicketPriority>,
}

impl From<TicketDBResponse> for TicketResponse {
    fn from(db: TicketDBResponse) -> Self {
        Self {
            ticket_id: db.id,
            profile_id: db.profile_id,
            user_id: db.user_id,
            subject: db.subject,
            description: db.description,
            status: db.status,
            priority: db.priority,
            document_path: db.document_path,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
