//! Metrics definitions for upstream calls.

use shared::metrics_defs::{MetricDef, MetricType};

pub const UPSTREAM_REQUEST_DURATION: MetricDef = MetricDef {
    name: "upstream.request.duration",
    metric_type: MetricType::Histogram,
    description: "Duration of live upstream calls in seconds. Tagged with service, endpoint, outcome.",
};

pub const UPSTREAM_FALLBACK: MetricDef = MetricDef {
    name: "upstream.fallback",
    metric_type: MetricType::Counter,
    description: "Number of responses answered from fallback data. Tagged with service, endpoint, reason.",
};

pub const ALL_METRICS: &[MetricDef] = &[UPSTREAM_REQUEST_DURATION, UPSTREAM_FALLBACK];
