//! Common type definitions and permission system types.
//!
//! This module defines:
//! - Type aliases for entity IDs (UserId, ProfileId, etc.)
//! - Resource and operation enums for access control
//! - The [`Permission`] requirement reported back when access is denied
//!
//! ## Operations
//!
//! Operations come in two flavors:
//! - **All**: Unrestricted access to all entities (e.g., `ReadAll`, `DeleteAll`)
//! - **Own**: Restricted to entities inside profiles the user owns or belongs to
//!   (e.g., `ReadOwn`, `UpdateOwn`)
//!
//! Administrators (`ADMIN`, `SUPER_ADMIN`) hold every operation on every resource.
//! Standard users hold the *Own operations on profile-scoped resources; see
//! [`crate::auth::permissions`].

use std::fmt;
use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type RoleId = Uuid;
pub type RefreshTokenId = Uuid;
pub type GuestId = Uuid;
pub type GuestRequestId = Uuid;
pub type ServiceId = Uuid;
pub type CategoryId = Uuid;
pub type ProfileId = Uuid;
/// Leads and sales share one identifier space: a sale keeps its lead's id.
pub type PipelineId = Uuid;
pub type WarmLeadId = Uuid;
pub type TaskId = Uuid;
pub type TaskSubmissionId = Uuid;
pub type TicketId = Uuid;
pub type TimeSlotId = Uuid;
pub type AppointmentId = Uuid;
pub type JobId = Uuid;
pub type SkillId = Uuid;
pub type ApplicationId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

// *-All means unrestricted access, *-Own means restricted to own profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateAll,
    CreateOwn,
    ReadAll,
    ReadOwn,
    UpdateAll,
    UpdateOwn,
    DeleteAll,
    DeleteOwn,
}

impl Operation {
    /// Whether this operation is limited to the caller's own profiles.
    pub fn is_own(self) -> bool {
        matches!(
            self,
            Operation::CreateOwn | Operation::ReadOwn | Operation::UpdateOwn | Operation::DeleteOwn
        )
    }
}

// Resources that can be operated on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Users,
    Roles,
    Guests,
    GuestRequests,
    Catalog,
    Profiles,
    Leads,
    Sales,
    WarmLeads,
    Tasks,
    TaskSubmissions,
    Tickets,
    TimeSlots,
    Appointments,
    Jobs,
    Applications,
    Metrics,
    Sync,
}

// Permission types for authorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    /// Simple permission: (Resource, Operation)
    Allow(Resource, Operation),
    /// User must own or belong to the specific profile
    Granted,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateAll | Operation::CreateOwn => write!(f, "Create"),
            Operation::ReadAll | Operation::ReadOwn => write!(f, "Read"),
            Operation::UpdateAll | Operation::UpdateOwn => write!(f, "Update"),
            Operation::DeleteAll | Operation::DeleteOwn => write!(f, "Delete"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbreviates_to_eight_chars() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(abbrev_uuid(&id), "550e8400");
    }

    #[test]
    fn own_operations() {
        assert!(Operation::ReadOwn.is_own());
        assert!(!Operation::ReadAll.is_own());
        assert_eq!(Operation::DeleteOwn.to_string(), "Delete");
    }
}
