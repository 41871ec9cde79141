//! Metrics definitions for the response cache.

use shared::metrics_defs::{MetricDef, MetricType};

pub const CACHE_HIT: MetricDef = MetricDef {
    name: "cache.hit",
    metric_type: MetricType::Counter,
    description: "Number of lookups served from the response cache",
};

pub const CACHE_MISS: MetricDef = MetricDef {
    name: "cache.miss",
    metric_type: MetricType::Counter,
    description: "Number of lookups that found no live entry",
};

pub const CACHE_SET: MetricDef = MetricDef {
    name: "cache.set",
    metric_type: MetricType::Counter,
    description: "Number of entries written to the response cache",
};

pub const CACHE_KEYS: MetricDef = MetricDef {
    name: "cache.keys",
    metric_type: MetricType::Gauge,
    description: "Number of entries held after the last sweep",
};

pub const ALL_METRICS: &[MetricDef] = &[CACHE_HIT, CACHE_MISS, CACHE_SET, CACHE_KEYS];
