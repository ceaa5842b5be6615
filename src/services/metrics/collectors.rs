use sqlx::{MySql, Pool};
use std::sync::Arc;
use std::time::Instant;

use super::MetricsRegistry;

/// Samples connection pool occupancy and records health-check outcomes.
pub struct PoolMetricsCollector {
    metrics: Arc<MetricsRegistry>,
}

impl PoolMetricsCollector {
    pub fn new(metrics: Arc<MetricsRegistry>) -> Self {
        Self { metrics }
    }

    pub fn sample(&self, pool: &Pool<MySql>) {
        let idle = pool.num_idle() as f64;
        let size = pool.size() as f64;
        self.metrics.db_connections_idle.set(idle);
        self.metrics.db_connections_active.set((size - idle).max(0.0));
    }

    /// Runs `SELECT 1` against the pool and records the result.
    pub async fn health_check(&self, pool: &Pool<MySql>) -> Result<(), sqlx::Error> {
        let timer = Instant::now();
        let result = sqlx::query("SELECT 1").execute(pool).await.map(|_| ());

        let status = if result.is_ok() { "ok" } else { "failed" };
        self.metrics
            .db_health_checks_total
            .with_label_values(&[status])
            .inc();
        tracing::debug!(
            status,
            elapsed_ms = timer.elapsed().as_millis() as u64,
            "Database health check"
        );

        self.sample(pool);
        result
    }
}
