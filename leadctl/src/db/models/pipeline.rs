//! Inputs and outputs of pipeline-wide operations: sheet upserts and metrics.

use super::leads::LeadStatus;
use super::sales::SaleStage;
use rust_decimal::Decimal;
use sqlx::FromRow;

/// One spreadsheet row keyed by its external id.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRecord {
    pub external_id: String,
    pub record: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertCounts {
    pub inserted: u64,
    pub updated: u64,
}

#[derive(Debug, Clone, FromRow)]
pub struct LeadStatusCount {
    pub status: LeadStatus,
    pub count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct SaleStageTotals {
    pub stage: SaleStage,
    pub count: i64,
    pub deal_value: Option<Decimal>,
}
