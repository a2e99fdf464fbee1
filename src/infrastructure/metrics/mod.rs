//! Prometheus Metrics Module
//!
//! Store-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - Query latency histograms by pool role and statement kind
//! - Query error counts by error class
//! - Replica lag gauges, fed by the replica lag monitor
//! - Connection pool gauges

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Query latency histogram - tracks statement duration in seconds
pub static DB_QUERY_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
    HistogramVec::new(
        HistogramOpts::new(
            "db_query_duration_seconds",
            "Database query latency in seconds",
        )
        .namespace("chat_store")
        .buckets(buckets),
        &["role", "kind"], // role: "master", "replica", "search"; kind: "select", "insert", ...
    )
    .expect("Failed to create DB_QUERY_DURATION_SECONDS metric")
});

/// Query error counter by classified error
pub static DB_QUERY_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("db_query_errors_total", "Total number of failed database queries")
            .namespace("chat_store"),
        &["role", "class"],
    )
    .expect("Failed to create DB_QUERY_ERRORS_TOTAL metric")
});

/// Replica lag gauge
pub static DB_REPLICA_LAG: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(
        Opts::new("db_replica_lag", "Replica lag reported by the configured lag queries")
            .namespace("chat_store"),
        &["node", "kind"], // kind: "absolute", "time"
    )
    .expect("Failed to create DB_REPLICA_LAG metric")
});

/// Database connection pool stats
pub static DB_POOL_CONNECTIONS: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(
        Opts::new("db_pool_connections", "Database connection pool statistics")
            .namespace("chat_store"),
        &["role", "state"], // state: "idle", "active", "max"
    )
    .expect("Failed to create DB_POOL_CONNECTIONS metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(DB_QUERY_DURATION_SECONDS.clone()))
        .expect("Failed to register DB_QUERY_DURATION_SECONDS");
    registry
        .register(Box::new(DB_QUERY_ERRORS_TOTAL.clone()))
        .expect("Failed to register DB_QUERY_ERRORS_TOTAL");
    registry
        .register(Box::new(DB_REPLICA_LAG.clone()))
        .expect("Failed to register DB_REPLICA_LAG");
    registry
        .register(Box::new(DB_POOL_CONNECTIONS.clone()))
        .expect("Failed to register DB_POOL_CONNECTIONS");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %err, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Helper to record query metrics
pub fn record_db_query(role: &str, kind: &str, duration_secs: f64) {
    Lazy::force(&REGISTRY);
    DB_QUERY_DURATION_SECONDS
        .with_label_values(&[role, kind])
        .observe(duration_secs);
}

/// Helper to record a failed query
pub fn record_db_error(role: &str, class: &str) {
    Lazy::force(&REGISTRY);
    DB_QUERY_ERRORS_TOTAL.with_label_values(&[role, class]).inc();
}

/// Helper to record a replica lag measurement
pub fn set_replica_lag(node: &str, kind: &str, value: f64) {
    Lazy::force(&REGISTRY);
    DB_REPLICA_LAG.with_label_values(&[node, kind]).set(value);
}

/// Helper to update database pool stats
pub fn update_db_pool_stats(role: &str, idle: u32, active: u32, max: u32) {
    Lazy::force(&REGISTRY);
    DB_POOL_CONNECTIONS
        .with_label_values(&[role, "idle"])
        .set(idle as f64);
    DB_POOL_CONNECTIONS
        .with_label_values(&[role, "active"])
        .set(active as f64);
    DB_POOL_CONNECTIONS
        .with_label_values(&[role, "max"])
        .set(max as f64);
}

/// Statement kind label derived from the leading SQL keyword.
pub fn statement_kind(sql: &str) -> &'static str {
    let head = sql
        .trim_start()
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    match head.as_str() {
        "SELECT" | "WITH" => "select",
        "INSERT" => "insert",
        "UPDATE" => "update",
        "DELETE" => "delete",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_kind() {
        assert_eq!(statement_kind("  select 1"), "select");
        assert_eq!(statement_kind("INSERT INTO Jobs"), "insert");
        assert_eq!(statement_kind("ALTER TABLE x"), "other");
        assert_eq!(statement_kind(""), "other");
    }

    #[test]
    fn test_gather_contains_recorded_metrics() {
        record_db_query("master", "select", 0.002);
        record_db_error("master", "deadlock");
        set_replica_lag("replica-0", "time", 1.5);
        update_db_pool_stats("master", 1, 2, 10);

        let output = gather_metrics();
        assert!(output.contains("chat_store_db_query_duration_seconds"));
        assert!(output.contains("chat_store_db_query_errors_total"));
        assert!(output.contains("chat_store_db_replica_lag"));
        assert!(output.contains("chat_store_db_pool_connections"));
    }
}
