//! Outcome report of the guest approval workflow.

use crate::types::{GuestId, GuestRequestId, ProfileId, UserId};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStepName {
    CheckExistingUser,
    CreateUser,
    MarkGuestApproved,
    CreateProfile,
    LinkUserProfile,
    ResolveRequest,
    SendCredentials,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    AlreadyDone,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalStep {
    pub step: ApprovalStepName,
    pub outcome: StepOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalReport {
    #[schema(value_type = String, format = "uuid")]
    pub guest_id: GuestId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub profile_id: Option<ProfileId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub request_id: Option<GuestRequestId>,
    pub steps: Vec<ApprovalStep>,
}

impl ApprovalReport {
    pub fn outcome_of(&self, step: ApprovalStepName) -> Option<StepOutcome> {
        self.steps.iter().find(|s| s.step == step).map(|s| s.outcome)
    }
}
