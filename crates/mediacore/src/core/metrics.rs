//! Prometheus metrics for the job pipeline
//!
//! Tracks:
//! - Job outcomes by mode
//! - External tool failures by operation
//! - Retries of flaky transfers
//!
//! Metrics live in a dedicated registry created by [`init_metrics`]. Until then
//! every `record_*` call is a no-op, which keeps unit tests free of global state.

use once_cell::sync::OnceCell;
use prometheus::{CounterVec, Encoder, Opts, Registry, TextEncoder};

struct Metrics {
    registry: Registry,
    jobs_total: CounterVec,
    tool_failures_total: CounterVec,
    task_retries_total: CounterVec,
}

static METRICS: OnceCell<Metrics> = OnceCell::new();

fn counter(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> prometheus::Result<CounterVec> {
    let vec = CounterVec::new(Opts::new(name, help), labels)?;
    registry.register(Box::new(vec.clone()))?;
    Ok(vec)
}

/// Create and register every metric. Safe to call more than once.
pub fn init_metrics() -> prometheus::Result<()> {
    if METRICS.get().is_some() {
        return Ok(());
    }
    log::info!("Initializing metrics registry...");

    let registry = Registry::new();
    let metrics = Metrics {
        jobs_total: counter(
            &registry,
            "mediabot_jobs_total",
            "Total number of finished jobs by mode and outcome",
            &["mode", "outcome"],
        )?,
        tool_failures_total: counter(
            &registry,
            "mediabot_tool_failures_total",
            "Total number of failed external tool invocations",
            &["operation"],
        )?,
        task_retries_total: counter(
            &registry,
            "mediabot_task_retries_total",
            "Total number of task retries",
            &["retry_count"],
        )?,
        registry,
    };

    // Losing the race to another initializer is fine, its registry wins.
    let _ = METRICS.set(metrics);
    Ok(())
}

pub fn record_job(mode: &str, outcome: &str) {
    if let Some(m) = METRICS.get() {
        m.jobs_total.with_label_values(&[mode, outcome]).inc();
    }
}

pub fn record_tool_failure(operation: &str) {
    if let Some(m) = METRICS.get() {
        m.tool_failures_total.with_label_values(&[operation]).inc();
    }
}

pub fn record_retry(attempt: u32) {
    if let Some(m) = METRICS.get() {
        m.task_retries_total.with_label_values(&[&attempt.to_string()]).inc();
    }
}

/// Render the registry in Prometheus text exposition format
pub fn render() -> Result<String, String> {
    let Some(m) = METRICS.get() else {
        return Ok(String::new());
    };
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&m.registry.gather(), &mut buffer)
        .map_err(|e| e.to_string())?;
    String::from_utf8(buffer).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorded_job_shows_up_in_render() {
        init_metrics().unwrap();
        init_metrics().unwrap();

        record_job("rename", "completed");
        record_tool_failure("compress");
        record_retry(1);

        let text = render().unwrap();
        assert!(text.contains("mediabot_jobs_total"));
        assert!(text.contains("mode=\"rename\""));
        assert!(text.contains("mediabot_tool_failures_total"));
    }
}
