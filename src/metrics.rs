//! Prometheus metrics collection for coterie.
//!
//! Tracks the write path (admissions, rejections by reason), the read path
//! (streamed and redacted records, synthesized summaries) and group state
//! reconstruction. Everything is a no-op until [`init`] runs, so library
//! embedders who never call it pay nothing.
//!
//! - `coterie_records_admitted_total` - Records accepted by the write path
//! - `coterie_records_rejected_total{reason}` - Rejections by reason code
//! - `coterie_records_streamed_total` - Records forwarded to subscribers
//! - `coterie_records_redacted_total` - Records stripped before forwarding
//! - `coterie_summaries_synthesized_total{kind}` - Summary records built on demand
//! - `coterie_groups_reconstructed_total` - Group replays from stored history
//! - `coterie_cached_groups` - Groups currently held in the process cache

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

/// Records accepted by the write-path pipeline.
pub static RECORDS_ADMITTED: OnceLock<IntCounter> = OnceLock::new();

/// Records rejected by the write-path pipeline, by reason code.
pub static RECORDS_REJECTED: OnceLock<IntCounterVec> = OnceLock::new();

/// Records forwarded to subscribers by the read-path pipeline.
pub static RECORDS_STREAMED: OnceLock<IntCounter> = OnceLock::new();

/// Records redacted before forwarding.
pub static RECORDS_REDACTED: OnceLock<IntCounter> = OnceLock::new();

/// Summary records synthesized on demand, by kind.
pub static SUMMARIES_SYNTHESIZED: OnceLock<IntCounterVec> = OnceLock::new();

/// Group states reconstructed from stored moderation history.
pub static GROUPS_RECONSTRUCTED: OnceLock<IntCounter> = OnceLock::new();

/// Groups currently held in the process cache.
pub static CACHED_GROUPS: OnceLock<IntGauge> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before any metrics are recorded.
pub fn init() {
    let r = registry();

    // Helper macro to register metric
    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(RECORDS_ADMITTED, IntCounter::new("coterie_records_admitted_total", "Records accepted by the write path"));
    register!(RECORDS_REJECTED, IntCounterVec::new(Opts::new("coterie_records_rejected_total", "Records rejected by the write path"), &["reason"]));
    register!(RECORDS_STREAMED, IntCounter::new("coterie_records_streamed_total", "Records forwarded to subscribers"));
    register!(RECORDS_REDACTED, IntCounter::new("coterie_records_redacted_total", "Records stripped before forwarding"));
    register!(SUMMARIES_SYNTHESIZED, IntCounterVec::new(Opts::new("coterie_summaries_synthesized_total", "Summary records built on demand"), &["kind"]));
    register!(GROUPS_RECONSTRUCTED, IntCounter::new("coterie_groups_reconstructed_total", "Group replays from stored history"));
    register!(CACHED_GROUPS, IntGauge::new("coterie_cached_groups", "Groups currently held in the process cache"));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

/// Record an admitted write.
#[inline]
pub fn inc_admitted() {
    if let Some(c) = RECORDS_ADMITTED.get() {
        c.inc();
    }
}

/// Record a rejected write with its reason code.
#[inline]
pub fn inc_rejected(reason: &str) {
    if let Some(c) = RECORDS_REJECTED.get() {
        c.with_label_values(&[reason]).inc();
    }
}

/// Record a record forwarded to a subscriber.
#[inline]
pub fn inc_streamed() {
    if let Some(c) = RECORDS_STREAMED.get() {
        c.inc();
    }
}

/// Record a redaction.
#[inline]
pub fn inc_redacted() {
    if let Some(c) = RECORDS_REDACTED.get() {
        c.inc();
    }
}

/// Record a synthesized summary of the given kind.
#[inline]
pub fn inc_summary(kind: u16) {
    if let Some(c) = SUMMARIES_SYNTHESIZED.get() {
        c.with_label_values(&[&kind.to_string()]).inc();
    }
}

/// Record a group reconstruction.
#[inline]
pub fn inc_reconstructed() {
    if let Some(c) = GROUPS_RECONSTRUCTED.get() {
        c.inc();
    }
}

/// Update the cached-groups gauge.
#[inline]
pub fn set_cached_groups(count: i64) {
    if let Some(g) = CACHED_GROUPS.get() {
        g.set(count);
    }
}
