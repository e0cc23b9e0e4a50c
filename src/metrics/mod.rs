use metrics::{counter, gauge, Counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;

use crate::rate_limit::Decision;

pub struct RateLimitMetrics {
    pub admitted_total: Counter,
    pub rejected_total: Counter,
    pub bypassed_total: Counter,
    pub swept_total: Counter,
}

pub static RATE_LIMIT_METRICS: Lazy<RateLimitMetrics> = Lazy::new(|| RateLimitMetrics {
    admitted_total: counter!("gallery_rate_limit_admitted_total"),
    rejected_total: counter!("gallery_rate_limit_rejected_total"),
    bypassed_total: counter!("gallery_rate_limit_bypassed_total"),
    swept_total: counter!("gallery_rate_limit_swept_total"),
});

pub fn record_decision(decision: &Decision) {
    match decision {
        Decision::Bypassed => RATE_LIMIT_METRICS.bypassed_total.increment(1),
        Decision::Admitted(_) => RATE_LIMIT_METRICS.admitted_total.increment(1),
        Decision::Rejected { .. } => RATE_LIMIT_METRICS.rejected_total.increment(1),
    }
}

pub fn record_sweep(removed: usize, tracked: usize) {
    RATE_LIMIT_METRICS.swept_total.increment(removed as u64);
    record_tracked_identities(tracked);
}

pub fn record_tracked_identities(tracked: usize) {
    gauge!("gallery_rate_limit_tracked_identities").set(tracked as f64);
}

pub fn record_catalog_import(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("gallery_catalog_imports_total", "outcome" => outcome).increment(1);
}

/// Install the global Prometheus recorder and return a handle for rendering.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(handle)
}
