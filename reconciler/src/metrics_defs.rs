//! Metrics definitions for the reconciler.

use shared::metrics_defs::{MetricDef, MetricType};

pub const GROUPS_STORED: MetricDef = MetricDef {
    name: "groups.stored",
    metric_type: MetricType::Counter,
    description: "Number of group records accepted by the store",
};

pub const GROUPS_REJECTED: MetricDef = MetricDef {
    name: "groups.rejected",
    metric_type: MetricType::Counter,
    description: "Number of submitted groups that failed validation",
};

pub const INVITE_LINKS_SELECTED: MetricDef = MetricDef {
    name: "invite_links.selected",
    metric_type: MetricType::Histogram,
    description: "Number of invite links written to a domain aggregate",
};

pub const STAGE_OUTCOMES: MetricDef = MetricDef {
    name: "reconcile.stage",
    metric_type: MetricType::Counter,
    description: "Stage results. Tagged with stage, outcome.",
};

pub const RECONCILE_DURATION: MetricDef = MetricDef {
    name: "reconcile.duration",
    metric_type: MetricType::Histogram,
    description: "Time to reconcile one batch in seconds. Tagged with status.",
};

pub const REQUESTS: MetricDef = MetricDef {
    name: "requests",
    metric_type: MetricType::Counter,
    description: "Requests handled by the dispatcher. Tagged with status code.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    GROUPS_STORED,
    GROUPS_REJECTED,
    INVITE_LINKS_SELECTED,
    STAGE_OUTCOMES,
    RECONCILE_DURATION,
    REQUESTS,
];
