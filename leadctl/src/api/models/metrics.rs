//! Pipeline metrics returned by `GET /metrics/pipeline`.

use crate::types::ProfileId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PipelineMetrics {
    /// Absent when aggregated over every profile
    #[schema(value_type = Option<String>, format = "uuid")]
    pub profile_id: Option<ProfileId>,
    pub leads_by_status: BTreeMap<String, i64>,
    pub sales_by_stage: BTreeMap<String, i64>,
    pub total_leads: i64,
    pub total_sales: i64,
    /// Sum of `dealValue` over `WON` sales
    #[schema(value_type = String)]
    pub total_deal_value: Decimal,
    /// Sum of `dealValue` over sales not yet `WON` or `LOST`
    #[schema(value_type = String)]
    pub open_deal_value: Decimal,
    /// `totalSales / (totalLeads + totalSales)`, 0 when both are empty
    pub conversion_rate: f64,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PipelineMetricsQuery {
    /// Required for non-administrators
    #[param(value_type = Option<String>, format = "uuid")]
    pub profile_id: Option<ProfileId>,
}
