//! Database layer for data persistence and access.
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (api::handlers - HTTP translation)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - queries and transactions)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - row structs and enum types)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┐
//! │  PostgreSQL │
//! └─────────────┘
//! ```
//!
//! # Transactions
//!
//! Repositories take `&mut PgConnection`, so the same code runs on a pooled
//! connection or inside a transaction. Multi-step writes (role seeding, the
//! approval workflow, pipeline moves, sheet upserts, appointment booking)
//! open a transaction and build each repository from it:
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! let approved = Guests::new(&mut tx).mark_approved(guest_id).await?;
//! tx.commit().await?;
//! ```
//!
//! Repositories that need several statements of their own call `begin()` on
//! the connection they were given, which becomes a savepoint when a
//! transaction is already open.
//!
//! # Migrations
//!
//! Migrations live in `migrations/` and are embedded by [`crate::migrator`].

pub mod errors;
pub mod handlers;
pub mod models;
