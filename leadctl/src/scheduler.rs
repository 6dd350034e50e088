//! Cron-driven background jobs.
//!
//! Two jobs run on the leader replica only:
//! - **sheet sync**: resync every profile bound to a spreadsheet through the [`SyncPool`]
//! - **purge**: delete pending guest requests older than `stale_request_age` and
//!   expired refresh tokens
//!
//! Schedules use six-field cron expressions (seconds first) evaluated in UTC.

use std::{future::Future, str::FromStr, sync::Arc, time::Duration};

use anyhow::Context;
use chrono::Utc;
use cron::Schedule;
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span};

use crate::{
    config::SchedulerConfig,
    db::handlers::{GuestRequests, RefreshTokens},
    leader_election::Leadership,
    sync::SyncPool,
};

pub fn parse_schedule(expression: &str) -> anyhow::Result<Schedule> {
    Schedule::from_str(expression).with_context(|| format!("invalid cron expression '{expression}'"))
}

/// Rows removed by one purge run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeCounts {
    pub guest_requests: u64,
    pub refresh_tokens: u64,
}

/// Remove pending guest requests created more than `max_age` ago, and expired refresh tokens.
pub async fn purge_stale_records(db: &PgPool, max_age: Duration) -> anyhow::Result<PurgeCounts> {
    let cutoff = Utc::now() - chrono::Duration::from_std(max_age).context("stale request age out of range")?;
    let mut conn = db.acquire().await.context("acquire connection")?;
    let guest_requests = GuestRequests::new(&mut conn).purge_pending_before(cutoff).await?;
    let refresh_tokens = RefreshTokens::new(&mut conn).delete_expired().await?;
    Ok(PurgeCounts {
        guest_requests,
        refresh_tokens,
    })
}

/// Run `job` at every fire time of `schedule` until `shutdown` is cancelled.
///
/// Fire times reached while this replica is not the leader are skipped.
pub async fn run_cron_job<F, Fut>(name: &'static str, schedule: Schedule, leadership: Leadership, shutdown: CancellationToken, mut job: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    loop {
        let Some(next) = schedule.upcoming(Utc).next() else {
            info!(job = name, "Schedule has no further fire times");
            return;
        };
        let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!(job = name, "Stopping cron job");
                return;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        if !leadership.is_leader() {
            debug!(job = name, "Not leader, skipping run");
            continue;
        }

        let started = std::time::Instant::now();
        match job().await {
            Ok(()) => {
                metrics::counter!("leadctl_cron_runs_total", "job" => name, "outcome" => "success").increment(1);
                debug!(job = name, elapsed_ms = started.elapsed().as_millis() as u64, "Cron job finished");
            }
            Err(e) => {
                metrics::counter!("leadctl_cron_runs_total", "job" => name, "outcome" => "failure").increment(1);
                error!(job = name, error = %e, "Cron job failed");
            }
        }
    }
}

/// Spawn the configured cron jobs. Returns no handles when the scheduler is disabled.
pub fn spawn_scheduler(
    config: &SchedulerConfig,
    db: PgPool,
    sync: Arc<SyncPool>,
    leadership: Leadership,
    shutdown: CancellationToken,
) -> anyhow::Result<Vec<JoinHandle<()>>> {
    if !config.enabled {
        info!("Scheduler disabled");
        return Ok(Vec::new());
    }

    let sync_schedule = parse_schedule(&config.sheet_sync_cron)?;
    let purge_schedule = parse_schedule(&config.guest_request_purge_cron)?;
    let stale_age = config.stale_request_age;

    let sync_job = tokio::spawn(
        run_cron_job("sheet_sync", sync_schedule, leadership.clone(), shutdown.clone(), move || {
            let sync = Arc::clone(&sync);
            async move {
                let report = sync.sync_all().await?;
                info!(succeeded = report.succeeded, failed = report.failed, "Scheduled sheet sync complete");
                Ok(())
            }
        })
        .instrument(info_span!("cron", job = "sheet_sync")),
    );

    let purge_job = tokio::spawn(
        run_cron_job("purge", purge_schedule, leadership, shutdown, move || {
            let db = db.clone();
            async move {
                let purged = purge_stale_records(&db, stale_age).await?;
                info!(
                    guest_requests = purged.guest_requests,
                    refresh_tokens = purged.refresh_tokens,
                    "Purged stale records"
                );
                Ok(())
            }
        })
        .instrument(info_span!("cron", job = "purge")),
    );

    info!("Scheduler started");
    Ok(vec![sync_job, purge_job])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_parse_schedule() {
        assert!(parse_schedule("0 */5 * * * *").is_ok());
        assert!(parse_schedule("0 0 0 1 * *").is_ok());
        let err = parse_schedule("every tuesday").unwrap_err();
        assert!(err.to_string().contains("every tuesday"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_leader_runs_job_until_cancelled() {
        let leadership = Leadership::new(true);
        let shutdown = CancellationToken::new();
        let runs = Arc::new(AtomicU32::new(0));

        let handle = {
            let runs = Arc::clone(&runs);
            let shutdown = shutdown.clone();
            tokio::spawn(run_cron_job("test", parse_schedule("* * * * * *").unwrap(), leadership, shutdown.clone(), move || {
                let runs = Arc::clone(&runs);
                let shutdown = shutdown.clone();
                async move {
                    if runs.fetch_add(1, Ordering::SeqCst) + 1 >= 3 {
                        shutdown.cancel();
                    }
                    Ok(())
                }
            }))
        };

        tokio::time::timeout(Duration::from_secs(60), handle).await.unwrap().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_follower_skips_runs() {
        let shutdown = CancellationToken::new();
        let runs = Arc::new(AtomicU32::new(0));

        let handle = {
            let runs = Arc::clone(&runs);
            tokio::spawn(run_cron_job(
                "test",
                parse_schedule("* * * * * *").unwrap(),
                Leadership::default(),
                shutdown.clone(),
                move || {
                    runs.fetch_add(1, Ordering::SeqCst);
                    async { Ok(()) }
                },
            ))
        };

        tokio::time::sleep(Duration::from_secs(5)).await;
        shutdown.cancel();
        handle.await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}

#[cfg(all(test, feature = "live-db-tests"))]
mod db_tests {
    use super::*;
    use crate::db::handlers::{Repository, guest_requests::GuestRequestFilter};
    use crate::test_utils::create_test_guest_request;

    #[sqlx::test]
    #[test_log::test]
    async fn test_purge_removes_only_stale_pending_requests(pool: PgPool) {
        let stale = create_test_guest_request(&pool).await;
        let fresh = create_test_guest_request(&pool).await;
        sqlx::query("UPDATE guest_requests SET created_at = NOW() - INTERVAL '40 days' WHERE id = $1")
            .bind(stale.id)
            .execute(&pool)
            .await
            .unwrap();

        let purged = purge_stale_records(&pool, Duration::from_secs(30 * 24 * 60 * 60)).await.unwrap();
        assert_eq!(purged.guest_requests, 1);

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = GuestRequests::new(&mut conn);
        assert!(repo.get_by_id(stale.id).await.unwrap().is_none());
        assert!(repo.get_by_id(fresh.id).await.unwrap().is_some());
        assert_eq!(repo.count(&GuestRequestFilter::default()).await.unwrap(), 1);
    }
}
