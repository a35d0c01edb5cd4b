use shared::metrics_defs::{MetricDef, MetricType};

pub const EVENTS_FORWARDED: MetricDef = MetricDef {
    name: "events.forwarded",
    metric_type: MetricType::Counter,
    description: "Events accepted by the vendor",
};

pub const EVENTS_FAILED: MetricDef = MetricDef {
    name: "events.failed",
    metric_type: MetricType::Counter,
    description: "Events the vendor rejected or that never got through",
};

pub const REQUESTS_REJECTED: MetricDef = MetricDef {
    name: "requests.rejected",
    metric_type: MetricType::Counter,
    description: "Tracking requests rejected during validation",
};

pub const PROFILE_UPDATES_FAILED: MetricDef = MetricDef {
    name: "profile_updates.failed",
    metric_type: MetricType::Counter,
    description: "Best-effort profile updates that failed",
};

pub const ALL_METRICS: &[MetricDef] = &[
    EVENTS_FORWARDED,
    EVENTS_FAILED,
    REQUESTS_REJECTED,
    PROFILE_UPDATES_FAILED,
];
