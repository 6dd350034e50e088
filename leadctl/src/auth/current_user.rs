//! Extractors for the authenticated caller.

use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::session,
    config::Config,
    errors::{Error, Result},
};
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use tracing::{instrument, trace};

/// Pull the bearer token out of the `Authorization` header.
///
/// Returns:
/// - None: no Authorization header
/// - Some(Ok(token)): a Bearer token is present
/// - Some(Err(error)): the header is present but not a usable Bearer token
fn bearer_token(headers: &HeaderMap) -> Option<Result<&str>> {
    let header = headers.get(AUTHORIZATION)?;
    let value = match header.to_str() {
        Ok(value) => value,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid authorization header: {e}"),
            }));
        }
    };

    match value.strip_prefix("Bearer ").map(str::trim) {
        Some(token) if !token.is_empty() => Some(Ok(token)),
        _ => Some(Err(Error::Unauthenticated {
            message: Some("Expected a Bearer token".to_string()),
        })),
    }
}

#[instrument(skip_all)]
fn authenticate(headers: &HeaderMap, config: &Config) -> Option<Result<CurrentUser>> {
    let token = match bearer_token(headers)? {
        Ok(token) => token,
        Err(e) => return Some(Err(e)),
    };
    let user = session::verify_access_token(token, config);
    if let Ok(user) = &user {
        trace!(user_id = %user.id, "Authenticated bearer token");
    }
    Some(user)
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        authenticate(&parts.headers, &state.config).unwrap_or(Err(Error::Unauthenticated { message: None }))
    }
}

/// Public routes that behave differently for signed-in callers take `Option<CurrentUser>`.
/// A malformed or expired token is still rejected rather than treated as anonymous.
impl OptionalFromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Option<Self>> {
        authenticate(&parts.headers, &state.config).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use uuid::Uuid;

    fn config() -> Config {
        Config {
            secret_key: Some("extractor-secret".to_string()),
            ..Default::default()
        }
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_missing_header_is_anonymous() {
        assert!(authenticate(&HeaderMap::new(), &config()).is_none());
    }

    #[test]
    fn test_valid_bearer_token() {
        let config = config();
        let user = CurrentUser {
            id: Uuid::new_v4(),
            email: "admin@leadctl.example".to_string(),
            contact_name: "Ada".to_string(),
            roles: vec!["ADMIN".to_string()],
        };
        let token = session::create_access_token(&user, &config).unwrap();

        let authed = authenticate(&headers(&format!("Bearer {token}")), &config).unwrap().unwrap();
        assert_eq!(authed.id, user.id);
        assert!(authed.is_admin());
    }

    #[test]
    fn test_non_bearer_scheme_is_rejected() {
        let result = authenticate(&headers("Basic dXNlcjpwYXNz"), &config()).unwrap();
        assert!(matches!(result, Err(Error::Unauthenticated { .. })));
    }

    #[test]
    fn test_garbage_token_is_rejected() {
        let result = authenticate(&headers("Bearer nope"), &config()).unwrap();
        assert!(matches!(result, Err(Error::Unauthenticated { .. })));
    }
}
