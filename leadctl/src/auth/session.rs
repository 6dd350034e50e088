//! Access token creation and verification.

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::{api::models::users::CurrentUser, config::Config, errors::Error, types::UserId};

/// Claims carried by an access token
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: UserId,
    pub email: String,
    pub name: String,
    pub roles: Vec<String>,
    pub exp: i64,
    pub iat: i64,
}

impl AccessClaims {
    pub fn new(user: &CurrentUser, config: &Config) -> Self {
        let now = Utc::now();
        let exp = now + config.auth.access_token_expiry;

        Self {
            sub: user.id,
            email: user.email.clone(),
            name: user.contact_name.clone(),
            roles: user.roles.clone(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        }
    }
}

impl From<AccessClaims> for CurrentUser {
    fn from(claims: AccessClaims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            contact_name: claims.name,
            roles: claims.roles,
        }
    }
}

/// Sign an access token for `user`
pub fn create_access_token(user: &CurrentUser, config: &Config) -> Result<String, Error> {
    let claims = AccessClaims::new(user, config);
    let key = EncodingKey::from_secret(config.secret_key()?.as_bytes());
    encode(&Header::default(), &claims, &key).map_err(|e| Error::Internal {
        operation: format!("create JWT: {e}"),
    })
}

/// Verify and decode an access token
pub fn verify_access_token(token: &str, config: &Config) -> Result<CurrentUser, Error> {
    let key = DecodingKey::from_secret(config.secret_key()?.as_bytes());

    let token_data = decode::<AccessClaims>(token, &key, &Validation::default()).map_err(|e| match e.kind() {
        // Anything the caller can get wrong is a 401
        ErrorKind::InvalidToken
        | ErrorKind::InvalidSignature
        | ErrorKind::ExpiredSignature
        | ErrorKind::MissingRequiredClaim(_)
        | ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAudience
        | ErrorKind::InvalidSubject
        | ErrorKind::ImmatureSignature
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_)
        | ErrorKind::InvalidAlgorithm => Error::Unauthenticated { message: None },
        _ => Error::Internal {
            operation: format!("JWT verification: {e}"),
        },
    })?;

    Ok(CurrentUser::from(token_data.claims))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use std::time::Duration;
    use uuid::Uuid;

    fn create_test_config() -> Config {
        Config {
            secret_key: Some("test-secret-key-for-jwt".to_string()),
            auth: AuthConfig {
                access_token_expiry: Duration::from_secs(900),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn create_test_user() -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            email: "owner@acme.example".to_string(),
            contact_name: "Olive Owner".to_string(),
            roles: vec!["USER".to_string()],
        }
    }

    #[test]
    fn test_create_and_verify_access_token() {
        let config = create_test_config();
        let user = create_test_user();

        let token = create_access_token(&user, &config).unwrap();
        let verified = verify_access_token(&token, &config).unwrap();

        assert_eq!(verified.id, user.id);
        assert_eq!(verified.email, user.email);
        assert_eq!(verified.contact_name, user.contact_name);
        assert_eq!(verified.roles, user.roles);
    }

    #[test]
    fn test_wrong_secret_is_unauthenticated() {
        let mut config = create_test_config();
        let token = create_access_token(&create_test_user(), &config).unwrap();

        config.secret_key = Some("different-secret".to_string());
        let result = verify_access_token(&token, &config);
        assert!(matches!(result, Err(Error::Unauthenticated { .. })));
    }

    #[test]
    fn test_expired_token_is_unauthenticated() {
        let config = create_test_config();
        let user = create_test_user();
        let now = Utc::now();
        let claims = AccessClaims {
            sub: user.id,
            email: user.email,
            name: user.contact_name,
            roles: user.roles,
            exp: (now - chrono::Duration::seconds(3600)).timestamp(),
            iat: (now - chrono::Duration::seconds(4500)).timestamp(),
        };
        let key = EncodingKey::from_secret(b"test-secret-key-for-jwt");
        let token = encode(&Header::default(), &claims, &key).unwrap();

        let result = verify_access_token(&token, &config);
        assert!(matches!(result, Err(Error::Unauthenticated { .. })));
    }

    #[test]
    fn test_malformed_tokens_are_unauthenticated() {
        let config = create_test_config();
        for token in ["not.a.token", "invalid", "", "too.many.parts.in.this.token"] {
            assert!(
                matches!(verify_access_token(token, &config), Err(Error::Unauthenticated { .. })),
                "expected 401 for {token:?}"
            );
        }
    }

    #[test]
    fn test_missing_secret_is_internal() {
        let config = Config {
            secret_key: None,
            ..create_test_config()
        };
        assert!(matches!(
            create_access_token(&create_test_user(), &config),
            Err(Error::Internal { .. })
        ));
    }
}
