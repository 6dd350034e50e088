//! Sales: leads that closed.
//!
//! Sales are never created directly; they appear when a lead is marked
//! `SALE_MADE`. Updating a sale with a lead status moves it back.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use sqlx::PgConnection;

use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        pipeline::{LeadResponse, ListSalesQuery, PipelineEntry, SaleResponse, SaleUpdate, SaleUpdateAction},
        users::CurrentUser,
    },
    auth::permissions::{RequiresPermission, ensure_profile_access, operation, require_profile_filter, resource},
    db::{
        handlers::{Pipeline, Repository, Sales, sales::SaleFilter},
        models::sales::SaleDBResponse,
    },
    errors::{Error, Result},
    types::PipelineId,
};

async fn accessible_sale(conn: &mut PgConnection, user: &CurrentUser, id: PipelineId) -> Result<SaleDBResponse> {
    let sale = Sales::new(&mut *conn).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Sale".to_string(),
        id: id.to_string(),
    })?;
    ensure_profile_access(conn, user, sale.profile_id).await?;
    Ok(sale)
}

#[utoipa::path(
    get,
    path = "/sales",
    tag = "sales",
    summary = "List sales",
    params(ListSalesQuery),
    responses(
        (status = 200, description = "Page of sales", body = PaginatedResponse<SaleResponse>),
        (status = 400, description = "profileId missing"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_sales(
    State(state): State<AppState>,
    Query(query): Query<ListSalesQuery>,
    current_user: RequiresPermission<resource::Sales, operation::ReadOwn>,
) -> Result<Json<PaginatedResponse<SaleResponse>>> {
    let profile_id = require_profile_filter(&current_user, query.profile_id)?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if let Some(profile_id) = profile_id {
        ensure_profile_access(&mut conn, &current_user, profile_id).await?;
    }

    let filter = SaleFilter {
        profile_id,
        stage: query.stage,
        offset: query.pagination.offset(),
        limit: query.pagination.limit(),
    };
    let mut repo = Sales::new(&mut conn);
    let sales = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;
    Ok(Json(PaginatedResponse::new(
        sales.into_iter().map(SaleResponse::from).collect(),
        total,
        &query.pagination,
    )))
}

#[utoipa::path(
    get,
    path = "/sales/{id}",
    tag = "sales",
    summary = "Get sale",
    params(("id" = String, Path, format = "uuid", description = "Sale ID")),
    responses(
        (status = 200, description = "Sale", body = SaleResponse),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_sale(
    State(state): State<AppState>,
    Path(id): Path<PipelineId>,
    current_user: RequiresPermission<resource::Sales, operation::ReadOwn>,
) -> Result<Json<SaleResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let sale = accessible_sale(&mut conn, &current_user, id).await?;
    Ok(Json(SaleResponse::from(sale)))
}

#[utoipa::path(
    patch,
    path = "/sales/{id}",
    tag = "sales",
    summary = "Update sale",
    description = "Either `status` alone, which moves the sale back into leads, or any of \
                   `stage`, `dealValue`, `dealCurrency` and `comment`.",
    params(("id" = String, Path, format = "uuid", description = "Sale ID")),
    request_body = SaleUpdate,
    responses(
        (status = 200, description = "The sale, or the lead it reverted to", body = PipelineEntry),
        (status = 400, description = "Invalid combination or status"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_sale(
    State(state): State<AppState>,
    Path(id): Path<PipelineId>,
    current_user: RequiresPermission<resource::Sales, operation::UpdateOwn>,
    Json(update): Json<SaleUpdate>,
) -> Result<Json<PipelineEntry>> {
    let action = update.into_action()?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    accessible_sale(&mut conn, &current_user, id).await?;

    let entry = match action {
        SaleUpdateAction::Revert(status) => {
            let lead = Pipeline::new(&mut conn).sale_to_lead(id, status, None).await?;
            PipelineEntry::Lead(LeadResponse::from(lead))
        }
        SaleUpdateAction::Amend(request) => {
            let sale = Sales::new(&mut conn).update(id, &request).await?;
            PipelineEntry::Sale(SaleResponse::from(sale))
        }
    };
    Ok(Json(entry))
}

#[utoipa::path(
    delete,
    path = "/sales/{id}",
    tag = "sales",
    summary = "Delete sale",
    params(("id" = String, Path, format = "uuid", description = "Sale ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_sale(
    State(state): State<AppState>,
    Path(id): Path<PipelineId>,
    current_user: RequiresPermission<resource::Sales, operation::DeleteOwn>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    accessible_sale(&mut conn, &current_user, id).await?;
    Sales::new(&mut conn).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(all(test, feature = "live-db-tests"))]
mod tests {
    use crate::api::models::pagination::PaginatedResponse;
    use crate::api::models::pipeline::{LeadResponse, PipelineEntry};
    use crate::db::handlers::{Leads, Pipeline, Repository};
    use crate::db::models::leads::{LeadCreateDBRequest, LeadStatus};
    use crate::test_utils::{bearer, create_test_app, create_test_profile, profile_owner};
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_sale_reverts_to_lead(pool: PgPool) {
        let (server, _bg, _dir) = create_test_app(pool.clone()).await;
        let profile = create_test_profile(&pool).await;
        let owner = profile_owner(&pool, &profile).await;

        let sale_id = {
            let mut conn = pool.acquire().await.unwrap();
            let lead = Leads::new(&mut conn)
                .create(&LeadCreateDBRequest {
                    id: None,
                    profile_id: profile.id,
                    external_id: Some("42".to_string()),
                    record: json!({"ID": "42", "Company": "Globex"}),
                    status: LeadStatus::Lead,
                    comment: None,
                })
                .await
                .unwrap();
            Pipeline::new(&mut conn).lead_to_sale(lead.id, None).await.unwrap().id
        };

        let rejected = server
            .patch(&format!("/api/v0.1/sales/{sale_id}"))
            .add_header("authorization", bearer(&owner))
            .json(&json!({"status": "SALE_MADE"}))
            .await;
        rejected.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = rejected.json();
        assert_eq!(body["message"], "Invalid status for sale update");

        let amended: PipelineEntry = server
            .patch(&format!("/api/v0.1/sales/{sale_id}"))
            .add_header("authorization", bearer(&owner))
            .json(&json!({"stage": "NEGOTIATION", "dealValue": "900", "dealCurrency": "gbp"}))
            .await
            .json();
        let PipelineEntry::Sale(sale) = amended else {
            panic!("expected a sale");
        };
        assert_eq!(sale.deal_currency.as_deref(), Some("GBP"));

        let reverted = server
            .patch(&format!("/api/v0.1/sales/{sale_id}"))
            .add_header("authorization", bearer(&owner))
            .json(&json!({"status": "OTHER"}))
            .await;
        reverted.assert_status_ok();
        let body: serde_json::Value = reverted.json();
        assert_eq!(body["kind"], "lead");

        server
            .get(&format!("/api/v0.1/sales/{sale_id}"))
            .add_header("authorization", bearer(&owner))
            .await
            .assert_status_not_found();

        let leads: PaginatedResponse<LeadResponse> = server
            .get("/api/v0.1/leads")
            .add_query_param("profileId", profile.id)
            .add_header("authorization", bearer(&owner))
            .await
            .json();
        let lead = leads.items.iter().find(|l| l.lead_id == sale_id).expect("lead with the sale's id");
        assert_eq!(lead.status, LeadStatus::Other);
        assert_eq!(lead.record["Company"], "Globex");
    }
}
