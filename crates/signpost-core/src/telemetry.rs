//! Metric names emitted by the lookup engine.
//!
//! Counters go through the `metrics` facade; without an installed recorder
//! they are no-ops.

use metrics::{describe_counter, Unit};
use std::sync::Once;

pub const CACHE_HIT_TOTAL: &str = "signpost_cache_hit_total";
pub const CACHE_MISS_TOTAL: &str = "signpost_cache_miss_total";
pub const CACHE_ERROR_TOTAL: &str = "signpost_cache_error_total";
pub const CACHE_WRITE_FAILURE_TOTAL: &str = "signpost_cache_write_failure_total";
pub const DURABLE_RECONNECT_TOTAL: &str = "signpost_durable_reconnect_total";

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Registers descriptions for every counter above. Safe to call repeatedly.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            CACHE_HIT_TOTAL,
            Unit::Count,
            "Lookups answered by the cache store."
        );
        describe_counter!(
            CACHE_MISS_TOTAL,
            Unit::Count,
            "Lookups the cache store had no value for."
        );
        describe_counter!(
            CACHE_ERROR_TOTAL,
            Unit::Count,
            "Cache store reads that failed and were treated as a miss."
        );
        describe_counter!(
            CACHE_WRITE_FAILURE_TOTAL,
            Unit::Count,
            "Cache store writes that failed and were dropped."
        );
        describe_counter!(
            DURABLE_RECONNECT_TOTAL,
            Unit::Count,
            "Durable store reconnect attempts after a failed ping."
        );
    });
}
