//! On-demand spreadsheet sync across every bound profile.

use axum::{Json, extract::State};

use crate::{
    AppState,
    api::models::sync::SyncRunReport,
    auth::permissions::{RequiresPermission, operation, resource},
    errors::Result,
};

#[utoipa::path(
    post,
    path = "/sync/run",
    tag = "sync",
    summary = "Run a full sync now",
    description = "Imports every profile with a bound spreadsheet through the sync pool and waits for the run to \
                   finish. Per-profile failures are reported in the body, not as an error status.",
    responses(
        (status = 200, description = "Run report", body = SyncRunReport),
        (status = 403, description = "Administrators only"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn run_sync(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Sync, operation::CreateAll>,
) -> Result<Json<SyncRunReport>> {
    let report = state.sync.sync_all().await?;
    tracing::info!(succeeded = report.succeeded, failed = report.failed, "Manual sync finished");
    Ok(Json(report))
}

#[cfg(all(test, feature = "live-db-tests"))]
mod tests {
    use crate::api::models::roles::{ADMIN, USER};
    use crate::api::models::sync::SyncRunReport;
    use crate::test_utils::{bearer, create_test_app, create_test_user};
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_manual_sync_is_admin_only(pool: PgPool) {
        let (server, _bg, _dir) = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, USER).await;
        let admin = create_test_user(&pool, ADMIN).await;

        server
            .post("/api/v0.1/sync/run")
            .add_header("authorization", bearer(&user))
            .await
            .assert_status_forbidden();

        // No profile has a sheet bound, so the run is empty.
        let report: SyncRunReport = server
            .post("/api/v0.1/sync/run")
            .add_header("authorization", bearer(&admin))
            .await
            .json();
        assert_eq!(report.succeeded + report.failed, 0);
    }
}
