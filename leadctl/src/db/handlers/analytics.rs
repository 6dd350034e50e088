//! Database queries for pipeline metrics.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::instrument;

use crate::{
    api::models::metrics::PipelineMetrics,
    db::{
        errors::Result,
        models::pipeline::{LeadStatusCount, SaleStageTotals},
        models::sales::SaleStage,
    },
    types::ProfileId,
};

/// Share of pipeline rows that reached `sales`, in `[0, 1]`.
pub fn conversion_rate(leads: i64, sales: i64) -> f64 {
    let total = leads + sales;
    if total <= 0 {
        return 0.0;
    }
    sales as f64 / total as f64
}

/// Fold per-status and per-stage aggregates into the metrics payload.
pub fn summarize(profile_id: Option<ProfileId>, leads: Vec<LeadStatusCount>, sales: Vec<SaleStageTotals>) -> PipelineMetrics {
    let total_leads = leads.iter().map(|row| row.count).sum();
    let total_sales = sales.iter().map(|row| row.count).sum();

    let mut won_deal_value = Decimal::ZERO;
    let mut open_deal_value = Decimal::ZERO;
    for row in &sales {
        let value = row.deal_value.unwrap_or_default();
        match row.stage {
            SaleStage::Won => won_deal_value += value,
            SaleStage::Lost => {}
            _ => open_deal_value += value,
        }
    }

    PipelineMetrics {
        profile_id,
        leads_by_status: leads.iter().map(|row| (row.status.as_str().to_string(), row.count)).collect::<BTreeMap<_, _>>(),
        sales_by_stage: sales.iter().map(|row| (row.stage.as_str().to_string(), row.count)).collect::<BTreeMap<_, _>>(),
        total_leads,
        total_sales,
        total_deal_value: won_deal_value,
        open_deal_value,
        conversion_rate: conversion_rate(total_leads, total_sales),
    }
}

/// Pipeline metrics for one profile, or across every profile when `profile_id` is `None`.
#[instrument(skip(db), err)]
pub async fn get_pipeline_metrics(db: &PgPool, profile_id: Option<ProfileId>) -> Result<PipelineMetrics> {
    let leads = sqlx::query_as::<_, LeadStatusCount>(
        r#"
        SELECT status, COUNT(*) AS count
        FROM leads
        WHERE ($1::uuid IS NULL OR profile_id = $1)
        GROUP BY status
        ORDER BY status
        "#,
    )
    .bind(profile_id)
    .fetch_all(db)
    .await?;

    let sales = sqlx::query_as::<_, SaleStageTotals>(
        r#"
        SELECT stage, COUNT(*) AS count, SUM(deal_value) AS deal_value
        FROM sales
        WHERE ($1::uuid IS NULL OR profile_id = $1)
        GROUP BY stage
        ORDER BY stage
        "#,
    )
    .bind(profile_id)
    .fetch_all(db)
    .await?;

    Ok(summarize(profile_id, leads, sales))
}
