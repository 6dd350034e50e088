//! Database record models matching table schemas.
//!
//! Every table gets a `*CreateDBRequest`, an `*UpdateDBRequest` whose `None`
//! fields keep the stored value, and a `*DBResponse` deriving `sqlx::FromRow`.
//! Postgres enum types are mirrored as Rust enums deriving `sqlx::Type`; they
//! serialize the same way on the wire so API models reuse them directly.
//!
//! Database models stay separate from [`crate::api::models`]; conversions live
//! next to the API types as `From` impls.

pub mod careers;
pub mod catalog;
pub mod guest_requests;
pub mod guests;
pub mod leads;
pub mod pipeline;
pub mod profiles;
pub mod refresh_tokens;
pub mod roles;
pub mod sales;
pub mod scheduling;
pub mod tasks;
pub mod tickets;
pub mod users;
pub mod warm_leads;
