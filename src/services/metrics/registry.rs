use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

const NAMESPACE: &str = "leornian";

/// Central metrics registry for the service
pub struct MetricsRegistry {
    registry: Registry,

    // HTTP Metrics
    pub http_requests_total: CounterVec,
    pub http_request_duration_seconds: HistogramVec,

    // Authentication Metrics
    pub auth_events_total: CounterVec,

    // Realtime Metrics
    pub realtime_connections_active: IntGauge,
    pub realtime_events_total: CounterVec,

    // Database Metrics
    pub db_connections_active: Gauge,
    pub db_connections_idle: Gauge,
    pub db_health_checks_total: CounterVec,
}

impl MetricsRegistry {
    pub fn new() -> prometheus::Result<Arc<Self>> {
        let registry = Registry::new();

        // HTTP Metrics
        let http_requests_total = CounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests").namespace(NAMESPACE),
            &["method", "endpoint", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "HTTP request duration")
                .namespace(NAMESPACE)
                .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["method", "endpoint"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        // Authentication Metrics
        let auth_events_total = CounterVec::new(
            Opts::new("auth_events_total", "Authentication events by outcome").namespace(NAMESPACE),
            &["event", "outcome"],
        )?;
        registry.register(Box::new(auth_events_total.clone()))?;

        // Realtime Metrics
        let realtime_connections_active = IntGauge::with_opts(
            Opts::new("realtime_connections_active", "Live realtime connections")
                .namespace(NAMESPACE),
        )?;
        registry.register(Box::new(realtime_connections_active.clone()))?;

        let realtime_events_total = CounterVec::new(
            Opts::new("realtime_events_total", "Realtime event deliveries").namespace(NAMESPACE),
            &["event_type", "outcome"],
        )?;
        registry.register(Box::new(realtime_events_total.clone()))?;

        // Database Metrics
        let db_connections_active = Gauge::with_opts(
            Opts::new("db_connections_active", "Database connections in use").namespace(NAMESPACE),
        )?;
        registry.register(Box::new(db_connections_active.clone()))?;

        let db_connections_idle = Gauge::with_opts(
            Opts::new("db_connections_idle", "Idle database connections").namespace(NAMESPACE),
        )?;
        registry.register(Box::new(db_connections_idle.clone()))?;

        let db_health_checks_total = CounterVec::new(
            Opts::new("db_health_checks_total", "Database health checks").namespace(NAMESPACE),
            &["status"],
        )?;
        registry.register(Box::new(db_health_checks_total.clone()))?;

        Ok(Arc::new(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            auth_events_total,
            realtime_connections_active,
            realtime_events_total,
            db_connections_active,
            db_connections_idle,
            db_health_checks_total,
        }))
    }

    pub fn record_auth_event(&self, event: &str, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.auth_events_total
            .with_label_values(&[event, outcome])
            .inc();
    }

    pub fn record_realtime_event(&self, event_type: &str, outcome: &str) {
        self.realtime_events_total
            .with_label_values(&[event_type, outcome])
            .inc();
    }

    pub fn set_realtime_connections(&self, count: usize) {
        self.realtime_connections_active.set(count as i64);
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
