//! Routing policy: round ceiling and deadline arithmetic
//!
//! The Nth reviewer (1-indexed) in a round starting at `start` gets
//! `deadline = start + N * review_period_days`.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::config::RoutingConfig;
use crate::db::models::AssignmentStatus;

#[derive(Debug, Clone, Copy)]
pub struct RoutingPolicy {
    /// Hard ceiling on rounds per schedule
    pub max_rounds: u32,

    /// Review window per reviewer, in days
    pub review_period_days: i64,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            max_rounds: 3,
            review_period_days: 14,
        }
    }
}

impl From<&RoutingConfig> for RoutingPolicy {
    fn from(config: &RoutingConfig) -> Self {
        Self {
            max_rounds: config.max_rounds,
            review_period_days: config.review_period_days,
        }
    }
}

/// An assignment to be created when a round starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAssignment {
    pub reviewer_id: Uuid,
    pub order: i32,
    pub deadline: DateTime<Utc>,
    pub status: AssignmentStatus,
}

impl RoutingPolicy {
    /// Deadline for the assignment at the given 1-based order
    pub fn deadline_for(&self, start: DateTime<Utc>, order: i32) -> DateTime<Utc> {
        start + Duration::days(self.review_period_days * order as i64)
    }

    /// Plan the assignment set for a round starting at `start`, preserving
    /// reviewer input order. The first assignment starts in progress, the
    /// rest pending.
    pub fn plan_assignments(
        &self,
        reviewer_ids: &[Uuid],
        start: DateTime<Utc>,
    ) -> Vec<PlannedAssignment> {
        reviewer_ids
            .iter()
            .enumerate()
            .map(|(index, &reviewer_id)| {
                let order = index as i32 + 1;
                PlannedAssignment {
                    reviewer_id,
                    order,
                    deadline: self.deadline_for(start, order),
                    status: if index == 0 {
                        AssignmentStatus::InProgress
                    } else {
                        AssignmentStatus::Pending
                    },
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day_zero() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_deadline_formula() {
        let policy = RoutingPolicy::default();
        let start = day_zero();
        assert_eq!(policy.deadline_for(start, 1), start + Duration::days(14));
        assert_eq!(policy.deadline_for(start, 2), start + Duration::days(28));
        assert_eq!(policy.deadline_for(start, 3), start + Duration::days(42));
    }

    #[test]
    fn test_plan_assignments_orders_and_statuses() {
        let policy = RoutingPolicy::default();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let start = day_zero();

        let planned = policy.plan_assignments(&[a, b], start);
        assert_eq!(planned.len(), 2);

        assert_eq!(planned[0].reviewer_id, a);
        assert_eq!(planned[0].order, 1);
        assert_eq!(planned[0].status, AssignmentStatus::InProgress);
        assert_eq!(planned[0].deadline, start + Duration::days(14));

        assert_eq!(planned[1].reviewer_id, b);
        assert_eq!(planned[1].order, 2);
        assert_eq!(planned[1].status, AssignmentStatus::Pending);
        assert_eq!(planned[1].deadline, start + Duration::days(28));
    }

    #[test]
    fn test_plan_single_reviewer() {
        let policy = RoutingPolicy::default();
        let planned = policy.plan_assignments(&[Uuid::new_v4()], day_zero());
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].status, AssignmentStatus::InProgress);
    }
}
