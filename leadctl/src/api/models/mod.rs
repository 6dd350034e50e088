//! API request and response data models.
//!
//! These structures define the public JSON contract. They are kept apart from the
//! database models so the wire format can evolve independently of storage:
//!
//! - keys are camelCase and primary keys are exposed as `<entity>Id`;
//! - enums reuse the database enum types and serialize in SCREAMING_SNAKE_CASE;
//! - every model derives `utoipa::ToSchema` (or `IntoParams` for query strings)
//!   so it shows up in the generated OpenAPI document.
//!
//! List endpoints take a `List*Query` that flattens [`pagination::Pagination`] and
//! answer with [`pagination::PaginatedResponse`].

pub mod approvals;
pub mod auth;
pub mod careers;
pub mod catalog;
pub mod guests;
pub mod metrics;
pub mod pagination;
pub mod pipeline;
pub mod profiles;
pub mod roles;
pub mod scheduling;
pub mod sync;
pub mod tasks;
pub mod tickets;
pub mod users;
pub mod warm_leads;

/// Emails are compared case-insensitively; store them trimmed and lower-cased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_email() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }
}
