//! Bounded worker pool that resyncs profiles from their spreadsheets.

use std::{future::Future, sync::Arc, time::Duration};

use anyhow::{Context, anyhow};
use chrono::Utc;
use dashmap::DashMap;
use sqlx::PgPool;
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{Instrument, debug, info, info_span, warn};

use super::sheets::{SheetsClient, parse_rows, spreadsheet_id_from_url};
use crate::{
    api::models::sync::{ProfileSyncReport, SyncRunReport},
    config::SyncPoolConfig,
    db::{
        handlers::{Pipeline, Profiles},
        models::{pipeline::UpsertCounts, profiles::ProfileDBResponse},
    },
    types::{ProfileId, abbrev_uuid},
};

/// Delay before retry number `retry` (1-based): `initial * factor^(retry-1)`, capped.
pub fn backoff_delay(settings: &SyncPoolConfig, retry: u32) -> Duration {
    let factor = settings.backoff_factor.max(1).saturating_pow(retry.saturating_sub(1));
    settings.initial_backoff.saturating_mul(factor).min(settings.max_backoff)
}

/// Run `op` until it succeeds or `max_retries` retries are spent.
///
/// Returns the last result and the number of attempts made.
pub async fn retry_with_backoff<T, F, Fut>(settings: &SyncPoolConfig, mut op: F) -> (anyhow::Result<T>, u32)
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return (Ok(value), attempt),
            Err(e) if attempt > settings.max_retries => return (Err(e), attempt),
            Err(e) => {
                let delay = backoff_delay(settings, attempt);
                warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "Attempt failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

struct InFlight {
    profiles: Arc<DashMap<ProfileId, ()>>,
    profile_id: ProfileId,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.profiles.remove(&self.profile_id);
    }
}

pub struct SyncPool {
    db: PgPool,
    sheets: Arc<dyn SheetsClient>,
    settings: SyncPoolConfig,
    id_column: String,
    in_flight: Arc<DashMap<ProfileId, ()>>,
}

impl SyncPool {
    pub fn new(db: PgPool, sheets: Arc<dyn SheetsClient>, settings: SyncPoolConfig, id_column: String) -> Self {
        Self {
            db,
            sheets,
            settings,
            id_column,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    pub fn sheets(&self) -> &Arc<dyn SheetsClient> {
        &self.sheets
    }

    /// Resync every profile bound to a spreadsheet.
    pub async fn sync_all(self: &Arc<Self>) -> anyhow::Result<SyncRunReport> {
        let mut conn = self.db.acquire().await.context("acquire connection")?;
        let profiles = Profiles::new(&mut conn).list_with_sheets().await?;
        drop(conn);
        Ok(self.sync_profiles(profiles).await)
    }

    /// Sync `profiles` with at most `max_concurrency` running at once.
    pub async fn sync_profiles(self: &Arc<Self>, profiles: Vec<ProfileDBResponse>) -> SyncRunReport {
        let started_at = Utc::now();
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for profile in profiles {
            let pool = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            let span = info_span!("sheet_sync", profile_id = %abbrev_uuid(&profile.id));
            tasks.spawn(
                async move {
                    // The semaphore is never closed
                    let _permit = semaphore.acquire_owned().await.ok();
                    pool.sync_profile(&profile).await
                }
                .instrument(span),
            );
        }

        let mut reports = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => warn!(error = %e, "Sheet sync task panicked"),
            }
        }

        let report = SyncRunReport::new(started_at, reports);
        info!(succeeded = report.succeeded, failed = report.failed, "Sheet sync run finished");
        report
    }

    /// Sync one profile, retrying with backoff.
    pub async fn sync_profile(&self, profile: &ProfileDBResponse) -> ProfileSyncReport {
        let mut report = ProfileSyncReport {
            profile_id: profile.id,
            ..Default::default()
        };

        if self.in_flight.insert(profile.id, ()).is_some() {
            report.error = Some("sync already in progress".to_string());
            metrics::counter!("leadctl_sheet_sync_total", "outcome" => "busy").increment(1);
            return report;
        }
        let _in_flight = InFlight {
            profiles: Arc::clone(&self.in_flight),
            profile_id: profile.id,
        };

        let (result, attempts) = retry_with_backoff(&self.settings, |_| self.sync_once(profile)).await;
        report.attempts = attempts;
        match result {
            Ok((counts, skipped)) => {
                report.inserted = counts.inserted;
                report.updated = counts.updated;
                report.skipped = skipped;
                metrics::counter!("leadctl_sheet_sync_total", "outcome" => "success").increment(1);
                metrics::histogram!("leadctl_sheet_sync_rows").record((counts.inserted + counts.updated + skipped) as f64);
                debug!(inserted = counts.inserted, updated = counts.updated, skipped, attempts, "Profile synced");
            }
            Err(e) => {
                metrics::counter!("leadctl_sheet_sync_total", "outcome" => "failure").increment(1);
                warn!(attempts, error = %e, "Profile sync failed");
                report.error = Some(format!("{e:#}"));
            }
        }
        report
    }

    async fn sync_once(&self, profile: &ProfileDBResponse) -> anyhow::Result<(UpsertCounts, u64)> {
        let (sheet_url, sheet_name) = profile
            .sheet_binding()
            .ok_or_else(|| anyhow!("profile has no spreadsheet bound"))?;
        let spreadsheet_id =
            spreadsheet_id_from_url(sheet_url).ok_or_else(|| anyhow!("cannot find a spreadsheet id in '{sheet_url}'"))?;

        let values = self.sheets.fetch_values(spreadsheet_id, sheet_name).await?;
        let parsed = parse_rows(&values, &self.id_column)?;

        let mut conn = self.db.acquire().await.context("acquire connection")?;
        let counts = Pipeline::new(&mut conn)
            .upsert_sheet_records(profile.id, &parsed.records)
            .await?;
        Ok((counts, parsed.skipped))
    }
}


#[cfg(all(test, feature = "live-db-tests"))]
mod db_tests {
    use super::*;
    use crate::db::handlers::{Leads, Repository, leads::LeadFilter};
    use crate::db::models::profiles::ProfileUpdateDBRequest;
    use crate::test_utils::create_test_profile;
    use async_trait::async_trait;

    struct FakeSheets {
        rows: Vec<Vec<String>>,
    }

    #[async_trait]
    impl SheetsClient for FakeSheets {
        async fn fetch_values(&self, spreadsheet_id: &str, _sheet_name: &str) -> anyhow::Result<Vec<Vec<String>>> {
            if spreadsheet_id == "broken" {
                return Err(anyhow!("sheet unavailable"));
            }
            Ok(self.rows.clone())
        }
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_sync_all_upserts_and_reports(pool: PgPool) {
        let good = create_test_profile(&pool).await;
        let broken = create_test_profile(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        for (profile, sheet) in [(&good, "good-id"), (&broken, "broken")] {
            Profiles::new(&mut conn)
                .update(
                    profile.id,
                    &ProfileUpdateDBRequest {
                        sheet_url: Some(format!("https://docs.google.com/spreadsheets/d/{sheet}/edit")),
                        sheet_name: Some("Sheet1".to_string()),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }

        let sheets = Arc::new(FakeSheets {
            rows: vec![row(&["ID", "Company"]), row(&["a1", "Initech"]), row(&["", "Nobody"]), row(&["a2", "Hooli"])],
        });
        let settings = SyncPoolConfig {
            max_retries: 1,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            ..Default::default()
        };
        let sync = Arc::new(SyncPool::new(pool.clone(), sheets, settings, "ID".to_string()));

        let report = sync.sync_all().await.unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);

        let good_report = report.profiles.iter().find(|p| p.profile_id == good.id).unwrap();
        assert_eq!((good_report.inserted, good_report.updated, good_report.skipped), (2, 0, 1));
        assert_eq!(good_report.attempts, 1);

        let broken_report = report.profiles.iter().find(|p| p.profile_id == broken.id).unwrap();
        assert_eq!(broken_report.attempts, 2);
        assert!(broken_report.error.as_deref().unwrap().contains("sheet unavailable"));

        // Second run refreshes instead of inserting
        let again = sync.sync_profile(&Profiles::new(&mut conn).get_by_id(good.id).await.unwrap().unwrap()).await;
        assert_eq!((again.inserted, again.updated), (0, 2));

        let leads = Leads::new(&mut conn)
            .count(&LeadFilter {
                profile_id: Some(good.id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(leads, 2);
    }
}
