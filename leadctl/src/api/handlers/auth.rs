//! Login, token refresh and logout.

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use sqlx::PgConnection;
use tracing::info;

use crate::{
    AppState,
    api::models::{
        auth::{LoginRequest, LoginResponse, RefreshRequest, TokenPair},
        normalize_email,
        users::{CurrentUser, UserResponse},
    },
    auth::{
        password::{generate_refresh_token, hash_token, verify_password_blocking},
        session::create_access_token,
    },
    config::Config,
    db::{
        handlers::{RefreshTokens, Repository, Users},
        models::{refresh_tokens::RefreshTokenCreateDBRequest, users::UserDBResponse},
    },
    errors::{Error, Result},
    types::abbrev_uuid,
};

fn invalid_credentials() -> Error {
    Error::Unauthenticated {
        message: Some("Invalid email or password".to_string()),
    }
}

/// Issue an access token and persist a fresh refresh token for `user`.
async fn issue_tokens(conn: &mut PgConnection, user: &UserDBResponse, config: &Config) -> Result<TokenPair> {
    let current = CurrentUser::from(user.clone());
    let access_token = create_access_token(&current, config)?;

    let refresh_token = generate_refresh_token();
    let expiry = chrono::Duration::from_std(config.auth.refresh_token_expiry).map_err(|e| Error::Internal {
        operation: format!("compute refresh token expiry: {e}"),
    })?;
    RefreshTokens::new(conn)
        .create(&RefreshTokenCreateDBRequest {
            user_id: user.id,
            token_hash: hash_token(&refresh_token),
            expires_at: Utc::now() + expiry,
        })
        .await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: config.auth.access_token_expiry.as_secs(),
    })
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    summary = "Log in with email and password",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Access and refresh tokens", body = LoginResponse),
        (status = 401, description = "Invalid email or password"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<Json<LoginResponse>> {
    let email = normalize_email(&request.email);
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let user = Users::new(&mut conn)
        .get_user_by_email(&email)
        .await?
        .ok_or_else(invalid_credentials)?;

    if !verify_password_blocking(request.password, user.password_hash.clone()).await? {
        return Err(invalid_credentials());
    }

    let tokens = issue_tokens(&mut conn, &user, &state.config).await?;
    info!(user_id = %abbrev_uuid(&user.id), "User logged in");
    Ok(Json(LoginResponse {
        tokens,
        user: UserResponse::from(user),
    }))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "auth",
    summary = "Rotate a refresh token",
    description = "The presented refresh token is consumed and a new token pair is issued.",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Unknown or expired refresh token"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn refresh(State(state): State<AppState>, Json(request): Json<RefreshRequest>) -> Result<Json<TokenPair>> {
    let token_hash = hash_token(&request.refresh_token);
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let stored = RefreshTokens::new(&mut tx).find_by_hash(&token_hash).await?;
    // Consumed either way: an expired token is useless
    RefreshTokens::new(&mut tx).delete_by_hash(&token_hash).await?;

    let stored = match stored {
        Some(stored) if stored.expires_at > Utc::now() => stored,
        _ => {
            tx.commit().await.map_err(|e| Error::Database(e.into()))?;
            return Err(Error::Unauthenticated {
                message: Some("Invalid or expired refresh token".to_string()),
            });
        }
    };

    let user = Users::new(&mut tx)
        .get_by_id(stored.user_id)
        .await?
        .ok_or_else(|| Error::Unauthenticated {
            message: Some("Invalid or expired refresh token".to_string()),
        })?;
    let tokens = issue_tokens(&mut tx, &user, &state.config).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(tokens))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    summary = "Revoke a refresh token",
    request_body = RefreshRequest,
    responses(
        (status = 204, description = "Token revoked (or already gone)"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, Json(request): Json<RefreshRequest>) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    RefreshTokens::new(&mut conn)
        .delete_by_hash(&hash_token(&request.refresh_token))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    summary = "The authenticated user",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn me(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<UserResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn)
        .get_by_id(current_user.id)
        .await?
        .ok_or_else(|| Error::Unauthenticated {
            message: Some("User no longer exists".to_string()),
        })?;
    Ok(Json(UserResponse::from(user)))
}

#[cfg(all(test, feature = "live-db-tests"))]
mod tests {
    use crate::api::models::auth::{LoginResponse, TokenPair};
    use crate::api::models::roles::USER;
    use crate::api::models::users::UserResponse;
    use crate::test_utils::{TEST_PASSWORD, create_test_app, create_test_user};
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_login_refresh_logout(pool: PgPool) {
        let (server, _bg, _dir) = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, USER).await;

        let response = server
            .post("/api/v0.1/auth/login")
            .json(&json!({"email": user.email.to_uppercase(), "password": TEST_PASSWORD}))
            .await;
        response.assert_status_ok();
        let login: LoginResponse = response.json();
        assert_eq!(login.user.user_id, user.id);
        assert_eq!(login.tokens.token_type, "Bearer");

        let me: UserResponse = server
            .get("/api/v0.1/auth/me")
            .add_header("authorization", format!("Bearer {}", login.tokens.access_token))
            .await
            .json();
        assert_eq!(me.email, user.email);

        let rotated = server
            .post("/api/v0.1/auth/refresh")
            .json(&json!({"refreshToken": login.tokens.refresh_token}))
            .await;
        rotated.assert_status_ok();
        let rotated: TokenPair = rotated.json();
        assert_ne!(rotated.refresh_token, login.tokens.refresh_token);

        // The old token was consumed by the rotation
        server
            .post("/api/v0.1/auth/refresh")
            .json(&json!({"refreshToken": login.tokens.refresh_token}))
            .await
            .assert_status_unauthorized();

        server
            .post("/api/v0.1/auth/logout")
            .json(&json!({"refreshToken": rotated.refresh_token}))
            .await
            .assert_status(axum::http::StatusCode::NO_CONTENT);
        server
            .post("/api/v0.1/auth/refresh")
            .json(&json!({"refreshToken": rotated.refresh_token}))
            .await
            .assert_status_unauthorized();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_wrong_password_is_unauthorized(pool: PgPool) {
        let (server, _bg, _dir) = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, USER).await;

        let response = server
            .post("/api/v0.1/auth/login")
            .json(&json!({"email": user.email, "password": "not-the-password"}))
            .await;
        response.assert_status_unauthorized();
        let body: serde_json::Value = response.json();
        assert_eq!(body["code"], "unauthenticated");

        server.get("/api/v0.1/auth/me").await.assert_status_unauthorized();
    }
}
