//! Shared fixtures for unit and database tests.

use crate::{
    api::models::roles::USER,
    auth::{
        password::{Argon2Params, hash_password},
        session::create_access_token,
    },
    config::{Config, EmailConfig, EmailTransportConfig, LeaderElectionConfig, PasswordConfig, SchedulerConfig, UploadsConfig},
    db::{
        handlers::{GuestRequests, Guests, Profiles, Repository, Roles, Services, Users},
        models::{
            catalog::{ServiceCreateDBRequest, ServiceDBResponse},
            guest_requests::{GuestRequestCreateDBRequest, GuestRequestDBResponse},
            guests::{GuestCreateDBRequest, GuestDBResponse},
            profiles::{ProfileCreateDBRequest, ProfileDBResponse},
            users::{UserCreateDBRequest, UserDBResponse},
        },
    },
};
use axum_test::TestServer;
use sqlx::PgPool;
use std::sync::OnceLock;
use tempfile::TempDir;
use uuid::Uuid;

/// Password of every user made by [`create_test_user`].
pub const TEST_PASSWORD: &str = "correct-horse-battery";

const TEST_SECRET_KEY: &str = "test-secret-key-for-testing-only";

/// Install the rustls provider once per process; reqwest needs it before building a TLS client.
pub fn install_crypto_provider() {
    static INSTALLED: OnceLock<()> = OnceLock::new();
    INSTALLED.get_or_init(|| {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    });
}

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", &Uuid::new_v4().simple().to_string()[..12])
}

fn fast_password_config() -> PasswordConfig {
    PasswordConfig {
        argon2_memory_kib: 1024,
        argon2_iterations: 1,
        argon2_parallelism: 1,
        ..Default::default()
    }
}

/// Config for tests. Emails go to `<dir>/emails` and uploads to `<dir>/upload`;
/// keep the returned [`TempDir`] alive for as long as the config is used.
pub fn create_test_config() -> (Config, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let emails = dir.path().join("emails");
    std::fs::create_dir_all(&emails).expect("Failed to create email dir");

    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        secret_key: Some(TEST_SECRET_KEY.to_string()),
        email: EmailConfig {
            transport: EmailTransportConfig::File {
                path: emails.to_string_lossy().to_string(),
            },
            ..Default::default()
        },
        uploads: UploadsConfig {
            root: dir.path().join("upload"),
            max_file_size: 1024 * 1024,
        },
        scheduler: SchedulerConfig {
            enabled: false,
            ..Default::default()
        },
        leader_election: LeaderElectionConfig { enabled: false },
        ..Default::default()
    };
    config.auth.password = fast_password_config();
    (config, dir)
}

/// Full router over `pool`, with background services and the temp dir backing it.
pub async fn create_test_app(pool: PgPool) -> (TestServer, crate::BackgroundServices, TempDir) {
    install_crypto_provider();
    let (config, dir) = create_test_config();
    let app = crate::Application::new_with_pool(config, pool)
        .await
        .expect("Failed to create application");
    let (server, bg) = app.into_test_server();
    (server, bg, dir)
}

pub async fn seed_roles(pool: &PgPool) {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Roles::new(&mut conn).seed_system_roles().await.expect("Failed to seed roles");
}

/// A verified user holding `role`, with password [`TEST_PASSWORD`].
pub async fn create_test_user(pool: &PgPool, role: &str) -> UserDBResponse {
    seed_roles(pool).await;
    let name = unique("user");
    let password_hash =
        hash_password(TEST_PASSWORD, Some(Argon2Params::from(&fast_password_config()))).expect("Failed to hash password");

    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            company_name: format!("{name} Ltd"),
            contact_name: name.clone(),
            email: format!("{name}@example.com"),
            phone: None,
            password_hash,
            is_verified: true,
            roles: vec![role.to_string()],
        })
        .await
        .expect("Failed to create test user")
}

/// `Authorization` header value carrying a fresh access token for `user`.
pub fn bearer(user: &UserDBResponse) -> String {
    let config = Config {
        secret_key: Some(TEST_SECRET_KEY.to_string()),
        ..Default::default()
    };
    let token = create_access_token(&user.clone().into(), &config).expect("Failed to sign access token");
    format!("Bearer {token}")
}

pub async fn create_test_guest(pool: &PgPool) -> GuestDBResponse {
    let name = unique("guest");
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Guests::new(&mut conn)
        .create(&GuestCreateDBRequest {
            company_name: format!("{name} Ltd"),
            contact_name: name.clone(),
            email: format!("{name}@example.com"),
            phone: Some("+44 20 7946 0000".to_string()),
            message: None,
        })
        .await
        .expect("Failed to create test guest")
}

pub async fn create_test_service(pool: &PgPool) -> ServiceDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Services::new(&mut conn)
        .create(&ServiceCreateDBRequest {
            name: unique("service"),
            description: None,
            category_ids: Vec::new(),
        })
        .await
        .expect("Failed to create test service")
}

/// A pending request from a new guest for a new service.
pub async fn create_test_guest_request(pool: &PgPool) -> GuestRequestDBResponse {
    let guest = create_test_guest(pool).await;
    let service = create_test_service(pool).await;
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    GuestRequests::new(&mut conn)
        .create(&GuestRequestCreateDBRequest {
            guest_id: guest.id,
            service_id: service.id,
            category_id: None,
        })
        .await
        .expect("Failed to create test guest request")
}

/// A profile owned by a new `USER` on a new service, with the owner as member.
pub async fn create_test_profile(pool: &PgPool) -> ProfileDBResponse {
    let owner = create_test_user(pool, USER).await;
    let service = create_test_service(pool).await;
    let mut tx = pool.begin().await.expect("Failed to begin transaction");
    let mut profiles = Profiles::new(&mut tx);
    let profile = profiles
        .create(&ProfileCreateDBRequest {
            user_id: owner.id,
            service_id: service.id,
            name: unique("profile"),
            sheet_url: None,
            sheet_name: None,
        })
        .await
        .expect("Failed to create test profile");
    profiles
        .add_member(owner.id, profile.id)
        .await
        .expect("Failed to add profile owner as member");
    tx.commit().await.expect("Failed to commit test profile");
    profile
}

pub async fn profile_owner(pool: &PgPool, profile: &ProfileDBResponse) -> UserDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Users::new(&mut conn)
        .get_by_id(profile.user_id)
        .await
        .expect("Failed to load profile owner")
        .expect("Profile owner missing")
}

/// Wait for a background unlink of `path` to land.
pub async fn assert_removed_eventually(path: &std::path::Path) {
    for _ in 0..50 {
        if !path.exists() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("upload {} was not removed", path.display());
}
