//! Reports produced by spreadsheet synchronization runs.

use crate::types::ProfileId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSyncReport {
    #[schema(value_type = String, format = "uuid")]
    pub profile_id: ProfileId,
    pub inserted: u64,
    pub updated: u64,
    /// Rows without an external id
    pub skipped: u64,
    pub attempts: u32,
    /// Last error when every attempt failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProfileSyncReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncRunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub succeeded: usize,
    pub failed: usize,
    pub profiles: Vec<ProfileSyncReport>,
}

impl SyncRunReport {
    pub fn new(started_at: DateTime<Utc>, mut profiles: Vec<ProfileSyncReport>) -> Self {
        profiles.sort_by_key(|p| p.profile_id);
        let succeeded = profiles.iter().filter(|p| p.succeeded()).count();
        Self {
            started_at,
            finished_at: Utc::now(),
            succeeded,
            failed: profiles.len() - succeeded,
            profiles,
        }
    }
}
