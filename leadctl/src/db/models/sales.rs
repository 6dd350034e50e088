//! Database models for sales.

use crate::types::{PipelineId, ProfileId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "sale_stage", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleStage {
    New,
    Negotiation,
    ProposalSent,
    Won,
    Lost,
}

impl SaleStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStage::New => "NEW",
            SaleStage::Negotiation => "NEGOTIATION",
            SaleStage::ProposalSent => "PROPOSAL_SENT",
            SaleStage::Won => "WON",
            SaleStage::Lost => "LOST",
        }
    }
}

/// Sales are only ever created from a lead and always carry its id.
#[derive(Debug, Clone)]
pub struct SaleCreateDBRequest {
    pub id: PipelineId,
    pub profile_id: ProfileId,
    pub external_id: Option<String>,
    pub record: serde_json::Value,
    pub stage: SaleStage,
    pub deal_value: Option<Decimal>,
    pub deal_currency: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaleUpdateDBRequest {
    pub stage: Option<SaleStage>,
    pub deal_value: Option<Decimal>,
    pub deal_currency: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct SaleDBResponse {
    pub id: PipelineId,
    pub profile_id: ProfileId,
    pub external_id: Option<String>,
    pub record: serde_json::Value,
    pub stage: SaleStage,
    pub deal_value: Option<Decimal>,
    pub deal_currency: Option<String>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
