use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::DbPool;
use crate::modules::auth::interface::{EmailTokenRepository, RefreshTokenRepository};
use crate::modules::oauth::interface::OAuthStateRepository;
use crate::services::metrics::PoolMetricsCollector;
use crate::services::rate_limit::AuthRateLimits;

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);
pub const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub refresh_tokens: u64,
    pub oauth_states: u64,
    pub password_resets: u64,
    pub verifications: u64,
}

impl SweepReport {
    pub fn total(&self) -> u64 {
        self.refresh_tokens + self.oauth_states + self.password_resets + self.verifications
    }
}

/// Periodic removal of expired credentials and stale rate-limit buckets.
pub struct Sweeper {
    refresh_tokens: Arc<dyn RefreshTokenRepository>,
    oauth_states: Arc<dyn OAuthStateRepository>,
    password_resets: Arc<dyn EmailTokenRepository>,
    verifications: Arc<dyn EmailTokenRepository>,
    rate_limits: AuthRateLimits,
}

impl Sweeper {
    pub fn new(
        refresh_tokens: Arc<dyn RefreshTokenRepository>,
        oauth_states: Arc<dyn OAuthStateRepository>,
        password_resets: Arc<dyn EmailTokenRepository>,
        verifications: Arc<dyn EmailTokenRepository>,
        rate_limits: AuthRateLimits,
    ) -> Self {
        Self {
            refresh_tokens,
            oauth_states,
            password_resets,
            verifications,
            rate_limits,
        }
    }

    /// One pass over every table; a failing table is logged and counted as zero.
    pub async fn sweep_once(&self) -> SweepReport {
        let report = SweepReport {
            refresh_tokens: log_sweep("refresh_tokens", self.refresh_tokens.delete_expired().await),
            oauth_states: log_sweep("oauth_states", self.oauth_states.delete_expired().await),
            password_resets: log_sweep(
                "password_reset_tokens",
                self.password_resets.delete_expired().await,
            ),
            verifications: log_sweep(
                "verification_tokens",
                self.verifications.delete_expired().await,
            ),
        };
        self.rate_limits.prune();

        if report.total() > 0 {
            tracing::info!(
                refresh_tokens = report.refresh_tokens,
                oauth_states = report.oauth_states,
                password_resets = report.password_resets,
                verifications = report.verifications,
                "Expired credentials removed"
            );
        }
        report
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    self.sweep_once().await;
                }
            }
        }
        tracing::debug!("Sweeper stopped");
    }
}

fn log_sweep<E: std::fmt::Display>(table: &'static str, result: Result<u64, E>) -> u64 {
    match result {
        Ok(removed) => removed,
        Err(e) => {
            tracing::warn!(table, error = %e, "Sweep failed");
            0
        }
    }
}

/// Samples the pool and runs `SELECT 1` until `shutdown` fires.
pub async fn run_pool_health_checks(
    pool: DbPool,
    collector: PoolMetricsCollector,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(HEALTH_CHECK_INTERVAL);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = collector.health_check(&pool).await {
                    tracing::error!(error = %e, "Database health check failed");
                }
            }
        }
    }
}
