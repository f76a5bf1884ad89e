//! The round state machine
//!
//! A single pure transition function shared by review submission and the
//! deadline tick. Given the current round and the outcome landing on one of
//! its assignments, it returns the full set of effects the caller must apply
//! in one transaction: the assignment's terminal status, the next assignment
//! to activate, round completion, schedule/thesis finalization, and the
//! notifications to send after commit.
//!
//! Rules:
//! - Assignments activate strictly in ascending `order`, one at a time.
//! - When the last assignment reaches a terminal state the round completes.
//! - A completed round finalizes the schedule (thesis -> PENDING_ARCHIVE)
//!   when every assignment approved (short-circuit) or when the round is the
//!   ceiling round, whatever the verdicts.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::db::models::{AssignmentStatus, RoundStatus};

/// Immutable view of one assignment, as loaded inside the transaction
#[derive(Debug, Clone)]
pub struct AssignmentState {
    pub id: Uuid,
    pub reviewer_id: Uuid,
    pub order: i32,
    pub status: AssignmentStatus,
    pub deadline: DateTime<Utc>,
}

/// Immutable view of one round with its assignments in ascending order
#[derive(Debug, Clone)]
pub struct RoundState {
    pub id: Uuid,
    pub round_number: i32,
    pub status: RoundStatus,
    pub assignments: Vec<AssignmentState>,
}

impl RoundState {
    pub fn assignment(&self, id: Uuid) -> Option<&AssignmentState> {
        self.assignments.iter().find(|a| a.id == id)
    }

    /// The in-progress assignment whose deadline has elapsed, if any.
    /// Under the single-active-assignment invariant there is at most one.
    pub fn first_overdue(&self, now: DateTime<Utc>) -> Option<&AssignmentState> {
        self.assignments
            .iter()
            .find(|a| a.status == AssignmentStatus::InProgress && a.deadline < now)
    }
}

/// How an in-progress assignment ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewOutcome {
    Approved,
    Rejected,
    /// Deadline elapsed without a submission
    Skipped,
}

impl ReviewOutcome {
    pub fn terminal_status(&self) -> AssignmentStatus {
        match self {
            ReviewOutcome::Approved => AssignmentStatus::Approved,
            ReviewOutcome::Rejected => AssignmentStatus::Rejected,
            ReviewOutcome::Skipped => AssignmentStatus::Skipped,
        }
    }
}

/// The next assignment to activate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivateNext {
    pub assignment_id: Uuid,
    pub reviewer_id: Uuid,
}

/// Schedule finalization: thesis -> PENDING_ARCHIVE, schedule -> COMPLETED
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Finalization {
    /// Whether the round finalized via unanimous approval (as opposed to
    /// the round ceiling)
    pub all_approved: bool,
}

/// Notifications the caller should dispatch after commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationIntent {
    /// Tell the next reviewer it is their turn
    ReviewerTurn { reviewer_id: Uuid },
    /// Tell the owner the round finished and a revision is wanted
    RoundComplete { round_number: i32 },
    /// Tell the owner routing finished and the archive gate is next
    ReadyForArchive {
        round_number: i32,
        all_approved: bool,
    },
}

/// Everything a single assignment outcome requires the caller to apply
#[derive(Debug, Clone)]
pub struct RoundEffects {
    /// The assignment the outcome landed on
    pub assignment_id: Uuid,
    pub new_status: AssignmentStatus,
    pub activate_next: Option<ActivateNext>,
    pub round_completed: bool,
    pub finalization: Option<Finalization>,
    pub notifications: Vec<NotificationIntent>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("assignment not found in round")]
    AssignmentNotFound,
    #[error("round is not in progress")]
    RoundNotInProgress,
    #[error("assignment is not in progress")]
    AssignmentNotInProgress,
}

/// Apply an outcome to the round's active assignment.
///
/// Pure: no I/O, no mutation. The caller applies the returned effects
/// transactionally and dispatches the notifications after commit.
pub fn apply_assignment_outcome(
    round: &RoundState,
    assignment_id: Uuid,
    outcome: ReviewOutcome,
    max_rounds: u32,
) -> Result<RoundEffects, TransitionError> {
    if round.status != RoundStatus::InProgress {
        return Err(TransitionError::RoundNotInProgress);
    }

    let current = round
        .assignment(assignment_id)
        .ok_or(TransitionError::AssignmentNotFound)?;

    if current.status != AssignmentStatus::InProgress {
        return Err(TransitionError::AssignmentNotInProgress);
    }

    let new_status = outcome.terminal_status();

    let next = round
        .assignments
        .iter()
        .find(|a| a.order == current.order + 1);

    if let Some(next) = next {
        // Round continues with the next reviewer
        return Ok(RoundEffects {
            assignment_id,
            new_status,
            activate_next: Some(ActivateNext {
                assignment_id: next.id,
                reviewer_id: next.reviewer_id,
            }),
            round_completed: false,
            finalization: None,
            notifications: vec![NotificationIntent::ReviewerTurn {
                reviewer_id: next.reviewer_id,
            }],
        });
    }

    // Last assignment in the round: complete it and decide finalization.
    // The just-landed outcome is patched in before the all-approved check,
    // so a skip can never count as approval.
    let all_approved = !round.assignments.is_empty()
        && round.assignments.iter().all(|a| {
            if a.id == assignment_id {
                new_status == AssignmentStatus::Approved
            } else {
                a.status == AssignmentStatus::Approved
            }
        });

    let at_ceiling = round.round_number >= max_rounds as i32;

    let (finalization, notifications) = if all_approved || at_ceiling {
        (
            Some(Finalization { all_approved }),
            vec![NotificationIntent::ReadyForArchive {
                round_number: round.round_number,
                all_approved,
            }],
        )
    } else {
        (
            None,
            vec![NotificationIntent::RoundComplete {
                round_number: round.round_number,
            }],
        )
    };

    Ok(RoundEffects {
        assignment_id,
        new_status,
        activate_next: None,
        round_completed: true,
        finalization,
        notifications,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::days(n)
    }

    fn assignment(order: i32, status: AssignmentStatus) -> AssignmentState {
        AssignmentState {
            id: Uuid::new_v4(),
            reviewer_id: Uuid::new_v4(),
            order,
            status,
            deadline: day(14 * order as i64),
        }
    }

    fn round(number: i32, assignments: Vec<AssignmentState>) -> RoundState {
        RoundState {
            id: Uuid::new_v4(),
            round_number: number,
            status: RoundStatus::InProgress,
            assignments,
        }
    }

    #[test]
    fn approval_activates_next_reviewer() {
        // First reviewer approves, second becomes active, round stays open
        let r = round(
            1,
            vec![
                assignment(1, AssignmentStatus::InProgress),
                assignment(2, AssignmentStatus::Pending),
            ],
        );
        let effects =
            apply_assignment_outcome(&r, r.assignments[0].id, ReviewOutcome::Approved, 3).unwrap();

        assert_eq!(effects.new_status, AssignmentStatus::Approved);
        assert_eq!(
            effects.activate_next,
            Some(ActivateNext {
                assignment_id: r.assignments[1].id,
                reviewer_id: r.assignments[1].reviewer_id,
            })
        );
        assert!(!effects.round_completed);
        assert!(effects.finalization.is_none());
        assert_eq!(
            effects.notifications,
            vec![NotificationIntent::ReviewerTurn {
                reviewer_id: r.assignments[1].reviewer_id
            }]
        );
    }

    #[test]
    fn unanimous_round_short_circuits_to_archive() {
        // Last reviewer approves with all prior approved; finalizes even
        // though the round number is below the ceiling
        let r = round(
            1,
            vec![
                assignment(1, AssignmentStatus::Approved),
                assignment(2, AssignmentStatus::InProgress),
            ],
        );
        let effects =
            apply_assignment_outcome(&r, r.assignments[1].id, ReviewOutcome::Approved, 3).unwrap();

        assert!(effects.round_completed);
        assert_eq!(
            effects.finalization,
            Some(Finalization { all_approved: true })
        );
        assert_eq!(
            effects.notifications,
            vec![NotificationIntent::ReadyForArchive {
                round_number: 1,
                all_approved: true
            }]
        );
    }

    #[test]
    fn rejection_completes_round_without_finalizing() {
        let r = round(
            1,
            vec![
                assignment(1, AssignmentStatus::Approved),
                assignment(2, AssignmentStatus::InProgress),
            ],
        );
        let effects =
            apply_assignment_outcome(&r, r.assignments[1].id, ReviewOutcome::Rejected, 3).unwrap();

        assert_eq!(effects.new_status, AssignmentStatus::Rejected);
        assert!(effects.round_completed);
        assert!(effects.finalization.is_none());
        assert_eq!(
            effects.notifications,
            vec![NotificationIntent::RoundComplete { round_number: 1 }]
        );
    }

    #[test]
    fn ceiling_round_finalizes_despite_rejection() {
        // Round 3 completes with a rejection present; finalizes anyway
        let r = round(
            3,
            vec![
                assignment(1, AssignmentStatus::Rejected),
                assignment(2, AssignmentStatus::InProgress),
            ],
        );
        let effects =
            apply_assignment_outcome(&r, r.assignments[1].id, ReviewOutcome::Approved, 3).unwrap();

        assert!(effects.round_completed);
        assert_eq!(
            effects.finalization,
            Some(Finalization {
                all_approved: false
            })
        );
        assert_eq!(
            effects.notifications,
            vec![NotificationIntent::ReadyForArchive {
                round_number: 3,
                all_approved: false
            }]
        );
    }

    #[test]
    fn skip_activates_next_reviewer() {
        // First reviewer times out, second becomes active
        let r = round(
            1,
            vec![
                assignment(1, AssignmentStatus::InProgress),
                assignment(2, AssignmentStatus::Pending),
            ],
        );
        let effects =
            apply_assignment_outcome(&r, r.assignments[0].id, ReviewOutcome::Skipped, 3).unwrap();

        assert_eq!(effects.new_status, AssignmentStatus::Skipped);
        assert!(effects.activate_next.is_some());
        assert!(!effects.round_completed);
    }

    #[test]
    fn skip_never_counts_toward_unanimous_approval() {
        // A skipped slot blocks the short-circuit; below the ceiling the
        // round completes without finalizing
        let r = round(
            2,
            vec![
                assignment(1, AssignmentStatus::Skipped),
                assignment(2, AssignmentStatus::InProgress),
            ],
        );
        let effects =
            apply_assignment_outcome(&r, r.assignments[1].id, ReviewOutcome::Approved, 3).unwrap();

        assert!(effects.round_completed);
        assert!(effects.finalization.is_none());
    }

    #[test]
    fn final_skip_on_ceiling_round_finalizes() {
        let r = round(3, vec![assignment(1, AssignmentStatus::InProgress)]);
        let effects =
            apply_assignment_outcome(&r, r.assignments[0].id, ReviewOutcome::Skipped, 3).unwrap();

        assert!(effects.round_completed);
        assert_eq!(
            effects.finalization,
            Some(Finalization {
                all_approved: false
            })
        );
    }

    #[test]
    fn single_reviewer_approval_finalizes_round_one() {
        let r = round(1, vec![assignment(1, AssignmentStatus::InProgress)]);
        let effects =
            apply_assignment_outcome(&r, r.assignments[0].id, ReviewOutcome::Approved, 3).unwrap();

        assert!(effects.round_completed);
        assert_eq!(
            effects.finalization,
            Some(Finalization { all_approved: true })
        );
    }

    #[test]
    fn rejects_outcome_on_pending_assignment() {
        let r = round(
            1,
            vec![
                assignment(1, AssignmentStatus::InProgress),
                assignment(2, AssignmentStatus::Pending),
            ],
        );
        let err = apply_assignment_outcome(&r, r.assignments[1].id, ReviewOutcome::Approved, 3)
            .unwrap_err();
        assert_eq!(err, TransitionError::AssignmentNotInProgress);
    }

    #[test]
    fn rejects_outcome_on_completed_round() {
        let mut r = round(1, vec![assignment(1, AssignmentStatus::Approved)]);
        r.status = RoundStatus::Completed;
        let err = apply_assignment_outcome(&r, r.assignments[0].id, ReviewOutcome::Approved, 3)
            .unwrap_err();
        assert_eq!(err, TransitionError::RoundNotInProgress);
    }

    #[test]
    fn rejects_unknown_assignment() {
        let r = round(1, vec![assignment(1, AssignmentStatus::InProgress)]);
        let err = apply_assignment_outcome(&r, Uuid::new_v4(), ReviewOutcome::Approved, 3)
            .unwrap_err();
        assert_eq!(err, TransitionError::AssignmentNotFound);
    }

    #[test]
    fn first_overdue_respects_status_and_strict_deadline() {
        let mut a1 = assignment(1, AssignmentStatus::InProgress);
        a1.deadline = day(14);
        let r = round(1, vec![a1, assignment(2, AssignmentStatus::Pending)]);

        // Exactly at the deadline is not overdue
        assert!(r.first_overdue(day(14)).is_none());
        // Past it is
        let overdue = r.first_overdue(day(14) + Duration::seconds(1)).unwrap();
        assert_eq!(overdue.order, 1);

        // Pending assignments are never overdue, whatever their deadline
        let r2 = round(1, vec![assignment(1, AssignmentStatus::Pending)]);
        assert!(r2.first_overdue(day(1000)).is_none());
    }
}
