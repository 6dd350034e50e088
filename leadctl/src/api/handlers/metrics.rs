//! Pipeline metrics.

use axum::{
    Json,
    extract::{Query, State},
};

use crate::{
    AppState,
    api::models::{
        metrics::{PipelineMetrics, PipelineMetricsQuery},
        users::CurrentUser,
    },
    auth::permissions::{RequiresPermission, ensure_profile_access, operation, require_profile_filter, resource},
    db::handlers::analytics,
    errors::{Error, Result},
};

#[utoipa::path(
    get,
    path = "/metrics/pipeline",
    tag = "metrics",
    summary = "Pipeline metrics",
    description = "Lead counts by status, sale counts by stage, deal values and the lead-to-sale conversion rate. \
                   Administrators may omit `profileId` to aggregate every profile.",
    params(PipelineMetricsQuery),
    responses(
        (status = 200, description = "Pipeline metrics", body = PipelineMetrics),
        (status = 400, description = "profileId missing"),
        (status = 403, description = "Profile belongs to someone else"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_pipeline_metrics(
    State(state): State<AppState>,
    Query(query): Query<PipelineMetricsQuery>,
    current_user: RequiresPermission<resource::Metrics, operation::ReadOwn>,
) -> Result<Json<PipelineMetrics>> {
    let user: &CurrentUser = &current_user;
    let profile_id = require_profile_filter(user, query.profile_id)?;
    if let Some(profile_id) = profile_id {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        ensure_profile_access(&mut conn, user, profile_id).await?;
    }
    let metrics = analytics::get_pipeline_metrics(&state.db, profile_id).await?;
    Ok(Json(metrics))
}

#[cfg(all(test, feature = "live-db-tests"))]
mod tests {
    use crate::api::models::metrics::PipelineMetrics;
    use crate::api::models::roles::{ADMIN, USER};
    use crate::test_utils::{bearer, create_test_app, create_test_profile, create_test_user, profile_owner};
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_metrics_follow_the_pipeline(pool: PgPool) {
        let (server, _bg, _dir) = create_test_app(pool.clone()).await;
        let profile = create_test_profile(&pool).await;
        let owner = profile_owner(&pool, &profile).await;

        for (external_id, status) in [("r1", "LEAD"), ("r2", "LEAD"), ("r3", "FOLLOW_UP")] {
            server
                .post("/api/v0.1/leads")
                .add_header("authorization", bearer(&owner))
                .json(&json!({"profileId": profile.id, "externalId": external_id, "status": status, "record": {}}))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let metrics: PipelineMetrics = server
            .get("/api/v0.1/metrics/pipeline")
            .add_query_param("profileId", profile.id)
            .add_header("authorization", bearer(&owner))
            .await
            .json();
        assert_eq!(metrics.total_leads, 3);
        assert_eq!(metrics.total_sales, 0);
        assert_eq!(metrics.leads_by_status.get("LEAD"), Some(&2));
        assert_eq!(metrics.conversion_rate, 0.0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_profile_id_required_for_users(pool: PgPool) {
        let (server, _bg, _dir) = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, USER).await;
        let admin = create_test_user(&pool, ADMIN).await;
        let other = create_test_profile(&pool).await;

        server
            .get("/api/v0.1/metrics/pipeline")
            .add_header("authorization", bearer(&user))
            .await
            .assert_status_bad_request();
        server
            .get("/api/v0.1/metrics/pipeline")
            .add_query_param("profileId", other.id)
            .add_header("authorization", bearer(&user))
            .await
            .assert_status_forbidden();
        server
            .get("/api/v0.1/metrics/pipeline")
            .add_header("authorization", bearer(&admin))
            .await
            .assert_status_ok();
    }
}
