//! # leadctl: multi-tenant sales lead management
//!
//! `leadctl` is the backend for a sales-lead service. Prospective clients sign up as
//! guests and ask for a service from the catalog; once an administrator approves
//! them they get a user account and a profile, a workspace bound to one service and
//! optionally to a Google spreadsheet. Leads are imported from that spreadsheet on a
//! schedule, worked through their statuses and promoted into sales when a deal is
//! made (and demoted back when it falls through).
//!
//! ## Architecture
//!
//! The HTTP layer is [Axum](https://github.com/tokio-rs/axum); all state lives in
//! PostgreSQL and is accessed through `sqlx` repositories.
//!
//! ### Core Components
//!
//! The **API layer** ([`api`]) serves a REST API under `/api/v0.1`. Every handler is
//! annotated for OpenAPI and returns [`errors::Error`] on failure.
//!
//! The **authentication layer** ([`auth`]) issues HS256 access tokens with rotating
//! refresh tokens and checks role based permissions. Standard users only see the
//! profiles they own or belong to.
//!
//! The **database layer** ([`db`]) follows the repository pattern. Multi-step writes
//! (approvals, pipeline moves, bookings) run inside one transaction.
//!
//! **Background services** run next to the HTTP server: leader election over a
//! Postgres advisory lock, and a cron scheduler that, on the leader only, syncs
//! every bound spreadsheet through a bounded worker pool and purges stale records.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use leadctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = leadctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     leadctl::telemetry::init_telemetry(&config)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
mod approvals;
pub mod auth;
mod booking;
pub mod config;
pub mod db;
mod email;
pub mod errors;
mod leader_election;
mod meetings;
mod openapi;
mod scheduler;
mod storage;
mod sync;
pub mod telemetry;
mod types;

#[cfg(test)]
pub mod test_utils;

use crate::{
    api::models::roles::SUPER_ADMIN,
    auth::password::{self, Argon2Params},
    db::handlers::{Repository, Roles, Users},
    db::models::users::UserCreateDBRequest,
    email::EmailService,
    leader_election::{LEADER_LOCK_ID, Leadership, leader_election_task},
    meetings::MeetingClient,
    openapi::ApiDoc,
    storage::UploadStore,
    sync::{GoogleSheetsClient, SheetsClient, SyncPool},
};
use api::handlers;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{self, HeaderValue},
    routing::{get, post, put},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::{CancellationToken, DropGuard};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument, warn};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{ProfileId, UserId};

/// Prefix every API route is nested under.
pub const API_PREFIX: &str = "/api/v0.1";

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .email(email)
///     .meetings(meetings)
///     .sync(sync)
///     .uploads(uploads)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub email: Arc<EmailService>,
    pub meetings: Arc<MeetingClient>,
    pub sync: Arc<SyncPool>,
    pub uploads: UploadStore,
}

/// Get the leadctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Seed the system roles and make sure the configured super admin exists.
///
/// Idempotent: the roles are upserted and an existing admin account is left as is.
/// Without `admin_password` no account is created.
#[instrument(skip_all)]
pub async fn seed_database(config: &Config, db: &PgPool) -> anyhow::Result<()> {
    let mut tx = db.begin().await?;
    Roles::new(&mut tx).seed_system_roles().await?;

    let email = api::models::normalize_email(&config.admin_email);
    let mut users = Users::new(&mut tx);
    if users.get_user_by_email(&email).await?.is_some() {
        debug!("Initial admin already present");
        tx.commit().await?;
        return Ok(());
    }

    let Some(admin_password) = config.admin_password.clone() else {
        warn!(email = %email, "admin_password not set; skipping initial admin creation");
        tx.commit().await?;
        return Ok(());
    };

    let password_hash = password::hash_password_blocking(admin_password, Argon2Params::from(&config.auth.password)).await?;
    let admin = users
        .create(&UserCreateDBRequest {
            company_name: "leadctl".to_string(),
            contact_name: "Administrator".to_string(),
            email,
            phone: None,
            password_hash,
            is_verified: true,
            roles: vec![SUPER_ADMIN.to_string()],
        })
        .await?;
    tx.commit().await?;

    info!(user_id = %types::abbrev_uuid(&admin.id), "Created initial admin");
    Ok(())
}

async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let settings = &config.database.pool;
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(settings.acquire_timeout)
        .idle_timeout(settings.idle_timeout)
        .connect(&config.database.url)
        .await?;

    migrator().run(&pool).await?;
    seed_database(config, &pool).await?;
    Ok(pool)
}

/// Build the shared state from a ready pool. External clients are constructed here.
pub fn build_state(pool: PgPool, config: Config) -> anyhow::Result<AppState> {
    let email = EmailService::new(&config)?;
    let meetings = MeetingClient::new(&config.meetings)?;
    let sheets: Arc<dyn SheetsClient> = Arc::new(GoogleSheetsClient::new(&config.sheets)?);
    let sync = SyncPool::new(
        pool.clone(),
        sheets,
        config.scheduler.sync_pool.clone(),
        config.sheets.id_column.clone(),
    );
    let uploads = UploadStore::new(&config.uploads);

    Ok(AppState::builder()
        .db(pool)
        .email(Arc::new(email))
        .meetings(Arc::new(meetings))
        .sync(Arc::new(sync))
        .uploads(uploads)
        .config(config)
        .build())
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.auth.cors;
    let allow_origin = if cors_config.allowed_origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        let origins = cors_config
            .allowed_origins
            .iter()
            .map(|origin| origin.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::PUT,
            http::Method::PATCH,
            http::Method::DELETE,
        ])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
        .allow_credentials(cors_config.allow_credentials)
        .expose_headers([http::header::LOCATION]);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        // Authentication
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/me", get(handlers::auth::me))
        // Accounts
        .route("/users", get(handlers::users::list_users).post(handlers::users::create_user))
        .route(
            "/users/{id}",
            get(handlers::users::get_user)
                .patch(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        .route("/users/{id}/roles", put(handlers::roles::set_user_roles))
        .route("/roles", get(handlers::roles::list_roles).post(handlers::roles::create_role))
        .route(
            "/roles/{id}",
            get(handlers::roles::get_role)
                .patch(handlers::roles::update_role)
                .delete(handlers::roles::delete_role),
        )
        // Onboarding
        .route("/guests", get(handlers::guests::list_guests).post(handlers::guests::create_guest))
        .route(
            "/guests/{id}",
            get(handlers::guests::get_guest)
                .patch(handlers::guests::update_guest)
                .delete(handlers::guests::delete_guest),
        )
        .route("/guests/{id}/approve", post(handlers::guests::approve_guest))
        .route(
            "/guest-requests",
            get(handlers::guest_requests::list_guest_requests).post(handlers::guest_requests::create_guest_request),
        )
        .route(
            "/guest-requests/{id}",
            get(handlers::guest_requests::get_guest_request)
                .patch(handlers::guest_requests::update_guest_request)
                .delete(handlers::guest_requests::delete_guest_request),
        )
        .route("/guest-requests/{id}/approve", post(handlers::guest_requests::approve_guest_request))
        // Catalog
        .route("/services", get(handlers::catalog::list_services).post(handlers::catalog::create_service))
        .route(
            "/services/{id}",
            get(handlers::catalog::get_service)
                .patch(handlers::catalog::update_service)
                .delete(handlers::catalog::delete_service),
        )
        .route("/services/{id}/categories", put(handlers::catalog::set_service_categories))
        .route("/categories", get(handlers::catalog::list_categories).post(handlers::catalog::create_category))
        .route(
            "/categories/{id}",
            get(handlers::catalog::get_category)
                .patch(handlers::catalog::update_category)
                .delete(handlers::catalog::delete_category),
        )
        // Profiles and the pipeline
        .route("/profiles", get(handlers::profiles::list_profiles).post(handlers::profiles::create_profile))
        .route(
            "/profiles/{id}",
            get(handlers::profiles::get_profile)
                .patch(handlers::profiles::update_profile)
                .delete(handlers::profiles::delete_profile),
        )
        .route("/profiles/{id}/sync", post(handlers::profiles::sync_profile))
        .route("/leads", get(handlers::leads::list_leads).post(handlers::leads::create_lead))
        .route(
            "/leads/{id}",
            get(handlers::leads::get_lead)
                .patch(handlers::leads::update_lead)
                .delete(handlers::leads::delete_lead),
        )
        .route("/sales", get(handlers::sales::list_sales))
        .route(
            "/sales/{id}",
            get(handlers::sales::get_sale)
                .patch(handlers::sales::update_sale)
                .delete(handlers::sales::delete_sale),
        )
        // Work items
        .route(
            "/warm-leads",
            get(handlers::warm_leads::list_warm_leads).post(handlers::warm_leads::create_warm_lead),
        )
        .route(
            "/warm-leads/{id}",
            get(handlers::warm_leads::get_warm_lead)
                .patch(handlers::warm_leads::update_warm_lead)
                .delete(handlers::warm_leads::delete_warm_lead),
        )
        .route("/tasks", get(handlers::tasks::list_tasks).post(handlers::tasks::create_task))
        .route(
            "/tasks/{id}",
            get(handlers::tasks::get_task)
                .patch(handlers::tasks::update_task)
                .delete(handlers::tasks::delete_task),
        )
        .route(
            "/task-submissions",
            get(handlers::task_submissions::list_task_submissions).post(handlers::task_submissions::create_task_submission),
        )
        .route(
            "/task-submissions/{id}",
            get(handlers::task_submissions::get_task_submission)
                .patch(handlers::task_submissions::update_task_submission)
                .delete(handlers::task_submissions::delete_task_submission),
        )
        .route("/tickets", get(handlers::tickets::list_tickets).post(handlers::tickets::create_ticket))
        .route(
            "/tickets/{id}",
            get(handlers::tickets::get_ticket)
                .patch(handlers::tickets::update_ticket)
                .delete(handlers::tickets::delete_ticket),
        )
        // Scheduling
        .route(
            "/time-slots",
            get(handlers::scheduling::list_time_slots).post(handlers::scheduling::create_time_slot),
        )
        .route(
            "/time-slots/{id}",
            get(handlers::scheduling::get_time_slot)
                .patch(handlers::scheduling::update_time_slot)
                .delete(handlers::scheduling::delete_time_slot),
        )
        .route(
            "/appointments",
            get(handlers::scheduling::list_appointments).post(handlers::scheduling::book_appointment),
        )
        .route(
            "/appointments/{id}",
            get(handlers::scheduling::get_appointment).delete(handlers::scheduling::delete_appointment),
        )
        // Careers
        .route("/jobs", get(handlers::careers::list_jobs).post(handlers::careers::create_job))
        .route(
            "/jobs/{id}",
            get(handlers::careers::get_job)
                .patch(handlers::careers::update_job)
                .delete(handlers::careers::delete_job),
        )
        .route("/jobs/{id}/skills", put(handlers::careers::set_job_skills))
        .route("/skills", get(handlers::careers::list_skills).post(handlers::careers::create_skill))
        .route(
            "/skills/{id}",
            axum::routing::patch(handlers::careers::update_skill).delete(handlers::careers::delete_skill),
        )
        .route(
            "/applications",
            get(handlers::careers::list_applications).post(handlers::careers::create_application),
        )
        .route(
            "/applications/{id}",
            get(handlers::careers::get_application)
                .patch(handlers::careers::update_application)
                .delete(handlers::careers::delete_application),
        )
        // Operations
        .route("/metrics/pipeline", get(handlers::metrics::get_pipeline_metrics))
        .route("/sync/run", post(handlers::sync::run_sync))
}

/// Build the main application router with all endpoints and middleware.
///
/// Layers, from the inside out: the request body limit, CORS, optional Prometheus
/// metrics and request tracing.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    // Multipart framing adds a little on top of the file itself.
    let body_limit = usize::try_from(state.config.uploads.max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(64 * 1024);

    let api = api_routes()
        .route("/openapi.json", get(|| async { axum::Json(ApiDoc::openapi()) }))
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(body_limit));

    let cors_layer = create_cors_layer(&state.config)?;
    let enable_metrics = state.config.enable_metrics;

    let mut router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest(API_PREFIX, api)
        .with_state(state)
        .layer(cors_layer);

    if enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Background tasks that run alongside the HTTP server.
///
/// Dropping the struct cancels the shutdown token through `drop_guard`, which stops
/// every task; [`shutdown`](BackgroundServices::shutdown) also waits for them.
pub struct BackgroundServices {
    leadership: Leadership,
    background_tasks: Vec<tokio::task::JoinHandle<()>>,
    shutdown_token: CancellationToken,
    // Pub so that we can disarm it if we want to
    pub drop_guard: Option<DropGuard>,
}

impl BackgroundServices {
    pub fn is_leader(&self) -> bool {
        self.leadership.is_leader()
    }

    /// Gracefully shutdown all background tasks
    pub async fn shutdown(self) {
        self.shutdown_token.cancel();
        for handle in self.background_tasks {
            let _ = handle.await;
        }
    }
}

/// Start leader election and the cron scheduler.
fn setup_background_services(state: &AppState, shutdown_token: CancellationToken) -> anyhow::Result<BackgroundServices> {
    let drop_guard = shutdown_token.clone().drop_guard();
    let mut background_tasks = Vec::new();

    let leadership = Leadership::default();
    background_tasks.push(tokio::spawn(leader_election_task(
        state.db.clone(),
        state.config.leader_election.clone(),
        leadership.clone(),
        LEADER_LOCK_ID,
        shutdown_token.clone(),
    )));

    background_tasks.extend(scheduler::spawn_scheduler(
        &state.config.scheduler,
        state.db.clone(),
        Arc::clone(&state.sync),
        leadership.clone(),
        shutdown_token.clone(),
    )?);

    Ok(BackgroundServices {
        leadership,
        background_tasks,
        shutdown_token,
        drop_guard: Some(drop_guard),
    })
}

/// Main application struct that owns all resources and lifecycle.
///
/// 1. [`Application::new`] connects, migrates, seeds and starts background services
/// 2. [`Application::serve`] binds the listener and handles requests until shutdown
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
    bg_services: BackgroundServices,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!(host = %config.host, port = config.port, "Starting leadctl");
        let pool = setup_database(&config).await?;
        Self::new_with_pool(config, pool).await
    }

    /// Build the application on an existing pool. Migrations and seeding still run.
    pub async fn new_with_pool(config: Config, pool: PgPool) -> anyhow::Result<Self> {
        migrator().run(&pool).await?;
        seed_database(&config, &pool).await?;

        let state = build_state(pool.clone(), config.clone())?;
        let bg_services = setup_background_services(&state, CancellationToken::new())?;
        let router = build_router(state)?;

        Ok(Self {
            router,
            config,
            pool,
            bg_services,
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> (axum_test::TestServer, BackgroundServices) {
        let server = axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server");
        (server, self.bg_services)
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("leadctl listening on http://{bind_addr}, docs at http://localhost:{}{API_PREFIX}/docs", self.config.port);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        self.bg_services.shutdown().await;

        info!("Closing database connections...");
        self.pool.close().await;
        Ok(())
    }
}

#[cfg(all(test, feature = "live-db-tests"))]
mod test {
    use super::seed_database;
    use crate::{
        api::models::roles::{SUPER_ADMIN, SYSTEM_ROLES},
        db::handlers::Users,
        test_utils::*,
    };
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_healthz_and_openapi(pool: PgPool) {
        let (server, _bg, _dir) = create_test_app(pool).await;

        let health = server.get("/healthz").await;
        health.assert_status_ok();
        assert_eq!(health.text(), "OK");

        let doc: serde_json::Value = server.get("/api/v0.1/openapi.json").await.json();
        let paths = doc["paths"].as_object().unwrap();
        assert!(paths.contains_key("/leads/{id}"));
        assert!(paths.contains_key("/appointments"));
        assert_eq!(doc["servers"][0]["url"], "/api/v0.1");
        assert!(doc["components"]["securitySchemes"]["BearerAuth"].is_object());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_seed_is_idempotent(pool: PgPool) {
        let (mut config, _dir) = create_test_config();
        config.admin_email = "Root@Example.com".to_string();
        config.admin_password = Some("root-password-123".to_string());

        seed_database(&config, &pool).await.unwrap();
        seed_database(&config, &pool).await.unwrap();

        let roles: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM roles WHERE name = ANY($1)")
            .bind(SYSTEM_ROLES.iter().map(|(name, _)| name.to_string()).collect::<Vec<_>>())
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(roles, 3);

        let mut conn = pool.acquire().await.unwrap();
        let admin = Users::new(&mut conn).get_user_by_email("root@example.com").await.unwrap().unwrap();
        assert_eq!(admin.roles, vec![SUPER_ADMIN.to_string()]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unauthenticated_requests_are_rejected(pool: PgPool) {
        let (server, _bg, _dir) = create_test_app(pool).await;

        let response = server.get("/api/v0.1/leads").await;
        response.assert_status_unauthorized();
        let body: serde_json::Value = response.json();
        assert_eq!(body["code"], "unauthenticated");
    }
}
