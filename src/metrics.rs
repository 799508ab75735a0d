use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the global Prometheus recorder
///
/// Fails if a recorder is already installed (e.g., in tests)
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    init_metric_descriptions();

    Ok(handle)
}

/// Initialize metric descriptions (can be called multiple times safely)
fn init_metric_descriptions() {
    describe_counter!(
        "logging_ds_queries_total",
        "Total number of executed sub-queries"
    );
    describe_counter!(
        "logging_ds_entries_total",
        "Total number of log entries returned to the host"
    );
    describe_histogram!(
        "logging_ds_query_duration_seconds",
        "Sub-query duration in seconds"
    );
    describe_counter!(
        "logging_ds_errors_total",
        "Total number of remote call failures"
    );
    describe_counter!(
        "logging_ds_suggestions_total",
        "Total number of editor suggestion calls"
    );
    describe_gauge!(
        "logging_ds_info",
        "Datasource version information"
    );

    gauge!("logging_ds_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

/// Record one finished sub-query
pub fn record_query(group_id: &str, entries: usize, duration: Duration) {
    counter!("logging_ds_queries_total", "group" => group_id.to_string()).increment(1);
    counter!("logging_ds_entries_total", "group" => group_id.to_string()).increment(entries as u64);
    histogram!("logging_ds_query_duration_seconds", "group" => group_id.to_string())
        .record(duration.as_secs_f64());
}

/// Record a failed remote operation
pub fn record_error(operation: &str) {
    counter!("logging_ds_errors_total", "operation" => operation.to_string()).increment(1);
}

pub fn record_suggestion() {
    counter!("logging_ds_suggestions_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_metrics() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            init_metric_descriptions();
            record_query("g1", 42, Duration::from_millis(250));
            record_error("read");
            record_suggestion();
        });

        let rendered = handle.render();
        assert!(rendered.contains("logging_ds_queries_total{group=\"g1\"} 1"));
        assert!(rendered.contains("logging_ds_entries_total{group=\"g1\"} 42"));
        assert!(rendered.contains("logging_ds_errors_total{operation=\"read\"} 1"));
        assert!(rendered.contains("logging_ds_suggestions_total 1"));
    }
}
