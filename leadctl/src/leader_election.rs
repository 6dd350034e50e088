use crate::config::LeaderElectionConfig;
use sqlx::PgPool;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Advisory lock key shared by every replica.
pub const LEADER_LOCK_ID: i64 = 0x1ead_c71;

const RENEW_INTERVAL: Duration = Duration::from_secs(30);

/// Shared flag telling background jobs whether this replica is the leader.
#[derive(Debug, Clone, Default)]
pub struct Leadership(Arc<AtomicBool>);

impl Leadership {
    pub fn new(is_leader: bool) -> Self {
        Self(Arc::new(AtomicBool::new(is_leader)))
    }

    pub fn is_leader(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn set(&self, leader: bool) {
        self.0.store(leader, Ordering::Relaxed);
    }
}

/// Background task for leader election.
///
/// The leader runs the cron jobs (sheet sync, stale request purge). When election is
/// disabled the instance marks itself leader and returns immediately.
///
/// PostgreSQL advisory locks are session-based, so the lock is held by a dedicated
/// connection for as long as we lead.
#[instrument(skip_all)]
pub async fn leader_election_task(
    pool: PgPool,
    config: LeaderElectionConfig,
    leadership: Leadership,
    lock_id: i64,
    shutdown: CancellationToken,
) {
    if !config.enabled {
        info!("Leader election disabled, running as leader");
        leadership.set(true);
        return;
    }

    let mut interval = tokio::time::interval(RENEW_INTERVAL);
    let mut leader_conn: Option<sqlx::pool::PoolConnection<sqlx::Postgres>> = None;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                if leader_conn.is_some() {
                    info!("Releasing leadership on shutdown");
                }
                leadership.set(false);
                return;
            }
            _ = interval.tick() => {}
        }

        match leader_conn.as_mut() {
            None => match pool.acquire().await {
                Ok(mut conn) => {
                    match sqlx::query_scalar::<_, bool>("SELECT pg_try_advisory_lock($1)")
                        .bind(lock_id)
                        .fetch_one(&mut *conn)
                        .await
                    {
                        Ok(true) => {
                            info!("Gained leadership");
                            leadership.set(true);
                            leader_conn = Some(conn);
                        }
                        Ok(false) => debug!("Following - will retry"),
                        Err(e) => error!("Failed to check leader lock: {}", e),
                    }
                }
                Err(e) => error!("Failed to acquire connection for leader election: {}", e),
            },
            Some(conn) => {
                // Losing the session drops the advisory lock with it
                if let Err(e) = sqlx::query("SELECT 1").execute(&mut **conn).await {
                    warn!("Lost leadership (connection died): {}", e);
                    leadership.set(false);
                    leader_conn = None;
                } else {
                    debug!("Leadership renewed");
                }
            }
        }
    }
}
