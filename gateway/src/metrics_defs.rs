//! Metrics definitions for the HTTP surface.

use shared::metrics_defs::{MetricDef, MetricType};

pub const RATE_LIMITED: MetricDef = MetricDef {
    name: "gateway.rate_limited",
    metric_type: MetricType::Counter,
    description: "Requests rejected by a rate limiter. Tagged with limiter.",
};

pub const AUTH_FAILURES: MetricDef = MetricDef {
    name: "gateway.auth.failures",
    metric_type: MetricType::Counter,
    description: "Requests to protected routes without a valid token. Tagged with reason.",
};

pub const FIELD_SOURCE_FAILURES: MetricDef = MetricDef {
    name: "gateway.fields.source_failures",
    metric_type: MetricType::Counter,
    description: "Field aggregation inputs that could not be read. Tagged with source.",
};

pub const ALL_METRICS: &[MetricDef] = &[RATE_LIMITED, AUTH_FAILURES, FIELD_SOURCE_FAILURES];
