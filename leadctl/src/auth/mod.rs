//! Authentication and authorization.
//!
//! Callers authenticate with a short-lived HS256 access token passed as
//! `Authorization: Bearer <token>`. Tokens are issued by `POST /auth/login` together
//! with an opaque refresh token; only the sha256 of the refresh token is stored, and
//! `POST /auth/refresh` rotates it.
//!
//! Authorization is role based:
//! - `SUPER_ADMIN` and `ADMIN` may do anything;
//! - `USER` works inside the profiles they own or belong to.
//!
//! # Modules
//!
//! - [`current_user`]: the [`CurrentUser`](crate::api::models::users::CurrentUser) extractor
//! - [`password`]: argon2 hashing, generated passwords and refresh tokens
//! - [`permissions`]: `RequiresPermission<R, O>` and the profile access check
//! - [`session`]: access token encoding and verification
//!
//! # Usage in handlers
//!
//! ```ignore
//! use leadctl::auth::permissions::{RequiresPermission, operation, resource};
//!
//! async fn list_guests(
//!     State(state): State<AppState>,
//!     _: RequiresPermission<resource::Guests, operation::ReadAll>,
//! ) -> Result<Json<PaginatedResponse<GuestResponse>>> {
//!     // only administrators get here
//! }
//! ```

pub mod current_user;
pub mod password;
pub mod permissions;
pub mod session;
