//! Metrics for the routing workflow
//!
//! Uses the metrics-rs facade; an exporter can be installed by the
//! deployment without code changes here.

use metrics::{counter, describe_counter, Unit};

/// Metrics prefix for all routing metrics
pub const METRICS_PREFIX: &str = "thesis_routing";

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_schedules_created_total", METRICS_PREFIX),
        Unit::Count,
        "Routing schedules created"
    );

    describe_counter!(
        format!("{}_reviews_submitted_total", METRICS_PREFIX),
        Unit::Count,
        "Peer reviews submitted (labelled by verdict)"
    );

    describe_counter!(
        format!("{}_revisions_submitted_total", METRICS_PREFIX),
        Unit::Count,
        "Revision uploads accepted"
    );

    describe_counter!(
        format!("{}_escalations_total", METRICS_PREFIX),
        Unit::Count,
        "Overdue assignments skipped by the deadline tick"
    );

    describe_counter!(
        format!("{}_rounds_completed_total", METRICS_PREFIX),
        Unit::Count,
        "Review rounds completed"
    );

    describe_counter!(
        format!("{}_archive_decisions_total", METRICS_PREFIX),
        Unit::Count,
        "Archive gate decisions (labelled by decision)"
    );

    describe_counter!(
        format!("{}_notifications_failed_total", METRICS_PREFIX),
        Unit::Count,
        "Notification writes that failed after commit"
    );
}

pub fn record_schedule_created() {
    counter!(format!("{}_schedules_created_total", METRICS_PREFIX)).increment(1);
}

pub fn record_review_submitted(approved: bool) {
    let verdict = if approved { "approved" } else { "rejected" };
    counter!(
        format!("{}_reviews_submitted_total", METRICS_PREFIX),
        "verdict" => verdict
    )
    .increment(1);
}

pub fn record_revision_submitted() {
    counter!(format!("{}_revisions_submitted_total", METRICS_PREFIX)).increment(1);
}

pub fn record_escalation() {
    counter!(format!("{}_escalations_total", METRICS_PREFIX)).increment(1);
}

pub fn record_round_completed() {
    counter!(format!("{}_rounds_completed_total", METRICS_PREFIX)).increment(1);
}

pub fn record_archive_decision(approved: bool) {
    let decision = if approved { "approved" } else { "rejected" };
    counter!(
        format!("{}_archive_decisions_total", METRICS_PREFIX),
        "decision" => decision
    )
    .increment(1);
}

pub fn record_notification_failure() {
    counter!(format!("{}_notifications_failed_total", METRICS_PREFIX)).increment(1);
}
