//! HTTP request handlers for all API endpoints.
//!
//! Handlers are grouped by resource. Each one validates its input, checks
//! permissions through the extractors in [`crate::auth::permissions`], runs
//! the work against a repository from [`crate::db::handlers`] and maps the
//! result to a response model from [`crate::api::models`].
//!
//! # Handler Modules
//!
//! - [`auth`]: login, token refresh, logout and password changes
//! - [`users`], [`roles`]: accounts and role assignment
//! - [`guests`], [`guest_requests`]: public sign-up and the approval workflow
//! - [`catalog`]: services and categories
//! - [`profiles`]: per-user workspaces and their spreadsheet binding
//! - [`leads`], [`sales`]: the pipeline, including moves between the two
//! - [`warm_leads`], [`tasks`], [`task_submissions`], [`tickets`]: profile-scoped work items
//! - [`scheduling`]: time slots and appointment booking
//! - [`careers`]: jobs, skills and applications
//! - [`metrics`]: pipeline metrics
//! - [`sync`]: manual spreadsheet sync
//! - [`uploads`]: multipart form reading shared by the handlers that accept files
//!
//! # Authentication
//!
//! Authenticated handlers take a bearer access token. Handlers that are
//! public (catalog reads, guest sign-up, booking, job postings) either take no
//! user extractor or take `Option<CurrentUser>` to widen what administrators see.
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`], which renders as a JSON body
//! carrying a `code` and a `message` with the matching status.

pub mod auth;
pub mod careers;
pub mod catalog;
pub mod guest_requests;
pub mod guests;
pub mod leads;
pub mod metrics;
pub mod profiles;
pub mod roles;
pub mod sales;
pub mod scheduling;
pub mod sync;
pub mod task_submissions;
pub mod tasks;
pub mod tickets;
pub mod uploads;
pub mod users;
pub mod warm_leads;
