//! Repository implementations for database access.
//!
//! Each repository wraps a `&mut PgConnection` (a pooled connection or an open
//! transaction), binds parameters for runtime `sqlx` queries and returns the
//! row structs from [`crate::db::models`]. Most implement the [`Repository`]
//! trait; list filters carry their page window so `list` and `count` can back
//! a paginated endpoint with the same filter value.
//!
//! # Available Repositories
//!
//! - [`Users`], [`Roles`], [`RefreshTokens`]: accounts and authentication
//! - [`Guests`], [`GuestRequests`]: pre-approval contacts and their requests
//! - [`Services`], [`Categories`]: the service catalog
//! - [`Profiles`]: per-user workspaces and memberships
//! - [`Leads`], [`Sales`], [`Pipeline`]: the two sides of the pipeline and the moves between them
//! - [`WarmLeads`], [`Tasks`], [`TaskSubmissions`], [`Tickets`]: profile-scoped work items
//! - [`TimeSlots`], [`Appointments`]: meeting booking
//! - [`Jobs`], [`Skills`], [`Applications`]: careers
//! - [`analytics`]: pipeline metrics queries
//! - [`attachments`]: upload paths orphaned by cascading deletes
//!
//! ```ignore
//! use leadctl::db::handlers::{Guests, Repository};
//!
//! let mut tx = pool.begin().await?;
//! let guest = Guests::new(&mut tx).create(&request).await?;
//! tx.commit().await?;
//! ```

pub mod analytics;
pub mod attachments;
pub mod careers;
pub mod catalog;
pub mod guest_requests;
pub mod guests;
pub mod leads;
pub mod pipeline;
pub mod profiles;
pub mod refresh_tokens;
pub mod repository;
pub mod roles;
pub mod sales;
pub mod scheduling;
pub mod tasks;
pub mod tickets;
pub mod users;
pub mod warm_leads;

pub use careers::{Applications, Jobs, Skills};
pub use catalog::{Categories, Services};
pub use guest_requests::GuestRequests;
pub use guests::Guests;
pub use leads::Leads;
pub use pipeline::Pipeline;
pub use profiles::Profiles;
pub use refresh_tokens::RefreshTokens;
pub use repository::Repository;
pub use roles::Roles;
pub use sales::Sales;
pub use scheduling::{Appointments, TimeSlots};
pub use tasks::{TaskSubmissions, Tasks};
pub use tickets::Tickets;
pub use users::Users;
pub use warm_leads::WarmLeads;
