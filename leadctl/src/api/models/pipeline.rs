//! API models for the two sides of the pipeline: leads and sales.
//!
//! A lead and the sale it became share one id, so both responses expose it under
//! their own name (`leadId`, `saleId`). Status changes that cross `SALE_MADE` are
//! answered with [`PipelineEntry`], tagged by `kind`.

use super::pagination::Pagination;
use crate::db::models::{
    leads::{LeadDBResponse, LeadStatus},
    sales::{SaleDBResponse, SaleStage, SaleUpdateDBRequest},
};
use crate::errors::Error;
use crate::types::{PipelineId, ProfileId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadCreate {
    #[schema(value_type = String, format = "uuid")]
    pub profile_id: ProfileId,
    pub external_id: Option<String>,
    /// Free-form row data, usually the spreadsheet columns
    #[serde(default = "empty_record")]
    #[schema(value_type = Object)]
    pub record: serde_json::Value,
    /// Defaults to `LEAD`; `SALE_MADE` is not accepted here
    pub status: Option<LeadStatus>,
    pub comment: Option<String>,
}

fn empty_record() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadUpdate {
    /// `SALE_MADE` moves the lead into sales
    pub status: Option<LeadStatus>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaleUpdate {
    /// Moves the sale back into leads; cannot be combined with other fields
    pub status: Option<LeadStatus>,
    pub stage: Option<SaleStage>,
    #[schema(value_type = Option<String>)]
    pub deal_value: Option<Decimal>,
    /// ISO 4217 code, e.g. `EUR`
    pub deal_currency: Option<String>,
    pub comment: Option<String>,
}

/// What a [`SaleUpdate`] asks for once validated.
#[derive(Debug, Clone, PartialEq)]
pub enum SaleUpdateAction {
    Revert(LeadStatus),
    Amend(SaleUpdateDBRequest),
}

impl SaleUpdate {
    fn has_sale_fields(&self) -> bool {
        self.stage.is_some() || self.deal_value.is_some() || self.deal_currency.is_some() || self.comment.is_some()
    }

    pub fn into_action(self) -> Result<SaleUpdateAction, Error> {
        match self.status {
            Some(_) if self.has_sale_fields() => Err(Error::BadRequest {
                message: "status cannot be combined with other sale fields".to_string(),
            }),
            Some(LeadStatus::SaleMade) => Err(Error::BadRequest {
                message: "Invalid status for sale update".to_string(),
            }),
            Some(status) => Ok(SaleUpdateAction::Revert(status)),
            None if !self.has_sale_fields() => Err(Error::BadRequest {
                message: "Sale update must change at least one field".to_string(),
            }),
            None => {
                let deal_currency = self.deal_currency.as_deref().map(normalize_currency).transpose()?;
                Ok(SaleUpdateAction::Amend(SaleUpdateDBRequest {
                    stage: self.stage,
                    deal_value: self.deal_value,
                    deal_currency,
                    comment: self.comment,
                }))
            }
        }
    }
}

/// Upper-case a three-letter currency code.
pub fn normalize_currency(code: &str) -> Result<String, Error> {
    let code = code.trim();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code.to_ascii_uppercase())
    } else {
        Err(Error::BadRequest {
            message: format!("Invalid currency code '{code}'"),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadResponse {
    #[schema(value_type = String, format = "uuid")]
    pub lead_id: PipelineId,
    #[schema(value_type = String, format = "uuid")]
    pub profile_id: ProfileId,
    pub external_id: Option<String>,
    #[schema(value_type = Object)]
    pub record: serde_json::Value,
    pub status: LeadStatus,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaleResponse {
    #[schema(value_type = String, format = "uuid")]
    pub sale_id: PipelineId,
    #[schema(value_type = String, format = "uuid")]
    pub profile_id: ProfileId,
    pub external_id: Option<String>,
    #[schema(value_type = Object)]
    pub record: serde_json::Value,
    pub stage: SaleStage,
    #[schema(value_type = Option<String>)]
    pub deal_value: Option<Decimal>,
    pub deal_currency: Option<String>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The row a pipeline update left behind, in whichever table it now lives.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PipelineEntry {
    Lead(LeadResponse),
    Sale(SaleResponse),
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListLeadsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    /// Required for non-administrators
    #[param(value_type = Option<String>, format = "uuid")]
    pub profile_id: Option<ProfileId>,
    #[param(inline)]
    pub status: Option<LeadStatus>,
    pub external_id: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListSalesQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    /// Required for non-administrators
    #[param(value_type = Option<String>, format = "uuid")]
    pub profile_id: Option<ProfileId>,
    #[param(inline)]
    pub stage: Option<SaleStage>,
}

impl From<LeadDBResponse> for LeadResponse {
    fn from(db: LeadDBResponse) -> Self {
        Self {
            lead_id: db.id,
            profile_id: db.profile_id,
            external_id: db.external_id,
            record: db.record,
            status: db.status,
            comment: db.comment,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl From<SaleDBResponse> for SaleResponse {
    fn from(db: SaleDBResponse) -> Self {
        Self {
            sale_id: db.id,
            profile_id: db.profile_id,
            external_id: db.external_id,
            record: db.record,
            stage: db.stage,
            deal_value: db.deal_value,
            deal_currency: db.deal_currency,
            comment: db.comment,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(body: serde_json::Value) -> SaleUpdate {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn status_alone_reverts() {
        let action = parse(json!({"status": "OTHER"})).into_action().unwrap();
        assert_eq!(action, SaleUpdateAction::Revert(LeadStatus::Other));
    }

    #[test]
    fn sale_made_is_rejected() {
        let err = parse(json!({"status": "SALE_MADE"})).into_action().unwrap_err();
        assert!(matches!(err, Error::BadRequest { message } if message == "Invalid status for sale update"));
    }

    #[test]
    fn status_with_fields_is_rejected() {
        let err = parse(json!({"status": "LEAD", "stage": "WON"})).into_action().unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));
    }

    #[test]
    fn empty_body_is_rejected() {
        assert!(parse(json!({})).into_action().is_err());
    }

    #[test]
    fn amend_normalizes_currency() {
        let action = parse(json!({"stage": "NEGOTIATION", "dealValue": "1200.50", "dealCurrency": "eur"}))
            .into_action()
            .unwrap();
        let SaleUpdateAction::Amend(update) = action else {
            panic!("expected amend");
        };
        assert_eq!(update.stage, Some(SaleStage::Negotiation));
        assert_eq!(update.deal_currency.as_deref(), Some("EUR"));
        assert_eq!(update.deal_value, Some(Decimal::new(120050, 2)));
    }

    #[test]
    fn rejects_bad_currency() {
        assert!(normalize_currency("EURO").is_err());
        assert!(normalize_currency("E1R").is_err());
        assert_eq!(normalize_currency(" usd ").unwrap(), "USD");
    }

    #[test]
    fn entry_is_tagged_by_kind() {
        let now = Utc::now();
        let entry = PipelineEntry::Lead(LeadResponse {
            lead_id: uuid::Uuid::nil(),
            profile_id: uuid::Uuid::nil(),
            external_id: None,
            record: json!({}),
            status: LeadStatus::FollowUp,
            comment: None,
            created_at: now,
            updated_at: now,
        });
        let value = serde_json::to_value(entry).unwrap();
        assert_eq!(value["kind"], "lead");
        assert_eq!(value["status"], "FOLLOW_UP");
        assert!(value.get("leadId").is_some());
    }
}
