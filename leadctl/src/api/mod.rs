//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! Everything is served under `/api/v0.1`:
//!
//! - **Authentication** (`/auth/*`): login, refresh, logout, password change
//! - **Accounts** (`/users/*`, `/roles/*`): users and their roles
//! - **Onboarding** (`/guests/*`, `/guest-requests/*`): public sign-up and approval
//! - **Catalog** (`/services/*`, `/categories/*`)
//! - **Workspaces** (`/profiles/*`) and the pipeline (`/leads/*`, `/sales/*`)
//! - **Work items** (`/warm-leads/*`, `/tasks/*`, `/task-submissions/*`, `/tickets/*`)
//! - **Scheduling** (`/time-slots/*`, `/appointments/*`)
//! - **Careers** (`/jobs/*`, `/skills/*`, `/applications/*`)
//! - **Operations** (`/metrics/pipeline`, `/sync/run`)
//!
//! # OpenAPI Documentation
//!
//! Endpoints are annotated with `utoipa`; the document is served at
//! `/api/v0.1/openapi.json` and rendered at `/api/v0.1/docs`.

pub mod handlers;
pub mod models;
