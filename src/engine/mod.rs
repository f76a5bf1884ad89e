//! The routing engine
//!
//! Owns the schedule -> round -> assignment hierarchy and implements the
//! workflow operations: schedule creation, review submission, revision
//! submission, deadline escalation, and the archive gate. Every
//! state-changing operation runs as one transaction serialized on the
//! schedule row; notifications are rendered from the transition's intents
//! and dispatched after commit, fire-and-forget.

pub mod policy;
pub mod transition;
pub mod views;

use chrono::{DateTime, Utc};
use sea_orm::{SqlErr, TransactionTrait};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::auth::{Actor, Role};
use crate::db::models::{
    Assignment, NotificationKind, RoundStatus, RoutingStatus, ScheduleStatus, Thesis,
};
use crate::db::{Repository, RoundWithAssignments, ScheduleBundle};
use crate::errors::{AppError, Result};
use crate::files::{FileStore, RevisionUpload};
use crate::metrics;
use crate::notify::{NewNotification, Notifier};

use policy::RoutingPolicy;
use transition::{
    apply_assignment_outcome, AssignmentState, NotificationIntent, ReviewOutcome, RoundEffects,
    RoundState, TransitionError,
};
use views::{
    AssignmentContext, PriorReview, RoundSummary, ScheduleDetail, ThesisSummary,
};

/// Input for schedule creation (§ routing engine, schedule creation)
#[derive(Debug, Clone)]
pub struct CreateScheduleInput {
    pub thesis_id: Uuid,
    /// Ordered; input order defines activation order for every round
    pub reviewer_ids: Vec<Uuid>,
    pub start_date: DateTime<Utc>,
}

/// Input for a reviewer's verdict on their active assignment
#[derive(Debug, Clone)]
pub struct SubmitReviewInput {
    pub assignment_id: Uuid,
    pub approved: bool,
    pub comment: Option<String>,
}

/// Result of accepting a revision
#[derive(Debug, Clone)]
pub struct RevisionOutcome {
    pub round_number: i32,
    pub file_url: String,
}

pub struct RoutingEngine {
    repo: Repository,
    notifier: Notifier,
    files: Arc<dyn FileStore>,
    policy: RoutingPolicy,
}

impl RoutingEngine {
    pub fn new(
        repo: Repository,
        notifier: Notifier,
        files: Arc<dyn FileStore>,
        policy: RoutingPolicy,
    ) -> Self {
        Self {
            repo,
            notifier,
            files,
            policy,
        }
    }

    // ========================================================================
    // Schedule creation
    // ========================================================================

    pub async fn create_schedule(
        &self,
        actor: Actor,
        input: CreateScheduleInput,
    ) -> Result<ScheduleDetail> {
        actor.require_role(&[Role::Admin])?;

        if input.reviewer_ids.is_empty() {
            return Err(AppError::Validation {
                message: "At least one peer reviewer is required".into(),
                field: Some("reviewer_ids".into()),
            });
        }
        let unique: BTreeSet<Uuid> = input.reviewer_ids.iter().copied().collect();
        if unique.len() != input.reviewer_ids.len() {
            return Err(AppError::Validation {
                message: "Reviewers must be unique".into(),
                field: Some("reviewer_ids".into()),
            });
        }

        let thesis = self
            .repo
            .find_thesis(input.thesis_id)
            .await?
            .ok_or_else(|| AppError::not_found("thesis", input.thesis_id))?;
        if thesis.routing_status != RoutingStatus::PendingReview {
            return Err(AppError::invalid_state("Thesis is not pending review"));
        }
        if self
            .repo
            .find_schedule_by_thesis(thesis.id)
            .await?
            .is_some()
        {
            return Err(AppError::invalid_state(
                "Thesis already has a routing schedule",
            ));
        }

        let reviewers = self.repo.find_users_by_ids(&input.reviewer_ids).await?;
        if reviewers.len() != input.reviewer_ids.len()
            || reviewers.iter().any(|r| r.role != Role::PeerReviewer)
        {
            return Err(AppError::Validation {
                message: "All selected reviewers must be peer reviewers".into(),
                field: Some("reviewer_ids".into()),
            });
        }

        let planned = self
            .policy
            .plan_assignments(&input.reviewer_ids, input.start_date);

        let txn = self.repo.write_conn().begin().await?;
        // A concurrent creation for the same thesis loses the race on the
        // thesis_id unique constraint; surface it like the sequential case
        let schedule = self
            .repo
            .insert_schedule(&txn, thesis.id, actor.id, input.start_date)
            .await
            .map_err(duplicate_schedule_guard)?;
        self.repo
            .insert_round_with_assignments(
                &txn,
                schedule.id,
                1,
                thesis.file_url.clone(),
                input.start_date,
                &planned,
            )
            .await?;
        self.repo
            .set_thesis_routing_status(&txn, thesis.id, RoutingStatus::InRouting)
            .await?;
        txn.commit().await?;

        metrics::record_schedule_created();
        info!(
            schedule_id = %schedule.id,
            thesis_id = %thesis.id,
            reviewers = planned.len(),
            "Routing schedule created"
        );

        let mut notifications = vec![NewNotification {
            user_id: thesis.user_id,
            kind: NotificationKind::RoutingAssigned,
            title: "Routing schedule created".into(),
            message: format!(
                "Your thesis \"{}\" has been assigned for routing.",
                thesis.title
            ),
            thesis_id: Some(thesis.id),
        }];
        notifications.extend(self.review_assigned_notifications(&thesis, &planned, 1, false));
        self.notifier.dispatch(notifications);

        self.load_detail(schedule.id).await
    }

    // ========================================================================
    // Review submission
    // ========================================================================

    pub async fn submit_review(
        &self,
        actor: Actor,
        schedule_id: Uuid,
        input: SubmitReviewInput,
    ) -> Result<()> {
        actor.require_role(&[Role::PeerReviewer, Role::Admin])?;

        let txn = self.repo.write_conn().begin().await?;

        let schedule = self
            .repo
            .lock_schedule(&txn, schedule_id)
            .await?
            .ok_or_else(|| AppError::not_found("schedule", schedule_id))?;
        let thesis = self
            .repo
            .find_thesis_on(&txn, schedule.thesis_id)
            .await?
            .ok_or_else(|| AppError::not_found("thesis", schedule.thesis_id))?;

        let rounds = self.repo.rounds_with_assignments(&txn, schedule.id).await?;
        let (round, assignment) = find_assignment(&rounds, input.assignment_id)
            .ok_or_else(|| AppError::not_found("assignment", input.assignment_id))?;

        if assignment.reviewer_id != actor.id {
            return Err(AppError::forbidden("You are not the assigned reviewer"));
        }

        let outcome = if input.approved {
            ReviewOutcome::Approved
        } else {
            ReviewOutcome::Rejected
        };
        let state = round_state(round);
        let effects =
            apply_assignment_outcome(&state, assignment.id, outcome, self.policy.max_rounds)
                .map_err(map_transition_error)?;

        let now = Utc::now();
        self.repo
            .record_review(
                &txn,
                assignment.id,
                effects.new_status,
                input.approved,
                input.comment,
                now,
            )
            .await?;
        self.apply_round_effects(&txn, schedule.id, round.round.id, thesis.id, &effects, now)
            .await?;
        txn.commit().await?;

        metrics::record_review_submitted(input.approved);
        if effects.round_completed {
            metrics::record_round_completed();
        }
        info!(
            schedule_id = %schedule.id,
            assignment_id = %assignment.id,
            approved = input.approved,
            round_completed = effects.round_completed,
            finalized = effects.finalization.is_some(),
            "Review submitted"
        );

        self.notifier
            .dispatch(self.render_intents(&effects.notifications, &thesis, false));

        Ok(())
    }

    // ========================================================================
    // Revision submission
    // ========================================================================

    pub async fn submit_revision(
        &self,
        actor: Actor,
        schedule_id: Uuid,
        upload: RevisionUpload,
    ) -> Result<RevisionOutcome> {
        // Every precondition is validated before the upload is stored so a
        // rejected call leaves nothing on disk.
        let schedule = self
            .repo
            .find_schedule(schedule_id)
            .await?
            .ok_or_else(|| AppError::not_found("schedule", schedule_id))?;
        if schedule.status != ScheduleStatus::Active {
            return Err(AppError::invalid_state("Schedule is not active"));
        }
        let thesis = self
            .repo
            .find_thesis(schedule.thesis_id)
            .await?
            .ok_or_else(|| AppError::not_found("thesis", schedule.thesis_id))?;
        if thesis.user_id != actor.id {
            return Err(AppError::forbidden("You are not the thesis owner"));
        }
        let rounds = self.repo.schedule_rounds(schedule.id).await?;
        next_round_plan(&rounds, self.policy.max_rounds)?;

        let file_url = self.files.store_revision(upload).await?;
        let now = Utc::now();

        let txn = self.repo.write_conn().begin().await?;
        // Re-check under the lock; the schedule may have advanced since the
        // precondition reads above.
        let schedule = self
            .repo
            .lock_schedule(&txn, schedule_id)
            .await?
            .ok_or_else(|| AppError::not_found("schedule", schedule_id))?;
        if schedule.status != ScheduleStatus::Active {
            return Err(AppError::invalid_state("Schedule is not active"));
        }

        let rounds = self.repo.rounds_with_assignments(&txn, schedule.id).await?;
        let plan = next_round_plan(&rounds, self.policy.max_rounds)?;

        let planned = self.policy.plan_assignments(&plan.reviewer_ids, now);
        self.repo
            .insert_round_with_assignments(
                &txn,
                schedule.id,
                plan.round_number,
                Some(file_url.clone()),
                now,
                &planned,
            )
            .await?;
        txn.commit().await?;

        metrics::record_revision_submitted();
        info!(
            schedule_id = %schedule.id,
            round_number = plan.round_number,
            "Revision accepted, next round started"
        );

        self.notifier.dispatch(self.review_assigned_notifications(
            &thesis,
            &planned,
            plan.round_number,
            true,
        ));

        Ok(RevisionOutcome {
            round_number: plan.round_number,
            file_url,
        })
    }

    // ========================================================================
    // Deadline escalation (the tick)
    // ========================================================================

    /// Skip at most one overdue assignment. Idempotent: returns false and
    /// mutates nothing when no in-progress assignment is past its deadline.
    pub async fn advance_deadlines(&self, _actor: Actor, schedule_id: Uuid) -> Result<bool> {
        let now = Utc::now();

        let txn = self.repo.write_conn().begin().await?;
        let schedule = self
            .repo
            .lock_schedule(&txn, schedule_id)
            .await?
            .ok_or_else(|| AppError::not_found("schedule", schedule_id))?;
        if schedule.status != ScheduleStatus::Active {
            return Err(AppError::invalid_state("Schedule is not active"));
        }
        let thesis = self
            .repo
            .find_thesis_on(&txn, schedule.thesis_id)
            .await?
            .ok_or_else(|| AppError::not_found("thesis", schedule.thesis_id))?;

        let rounds = self.repo.rounds_with_assignments(&txn, schedule.id).await?;
        let Some(open_round) = rounds
            .iter()
            .find(|r| r.round.status == RoundStatus::InProgress)
        else {
            return Ok(false);
        };

        let state = round_state(open_round);
        let Some(overdue) = state.first_overdue(now) else {
            return Ok(false);
        };
        let overdue_id = overdue.id;

        let effects =
            apply_assignment_outcome(&state, overdue_id, ReviewOutcome::Skipped, self.policy.max_rounds)
                .map_err(map_transition_error)?;

        self.repo.mark_skipped(&txn, overdue_id).await?;
        self.apply_round_effects(
            &txn,
            schedule.id,
            open_round.round.id,
            thesis.id,
            &effects,
            now,
        )
        .await?;
        txn.commit().await?;

        metrics::record_escalation();
        if effects.round_completed {
            metrics::record_round_completed();
        }
        info!(
            schedule_id = %schedule.id,
            assignment_id = %overdue_id,
            round_completed = effects.round_completed,
            finalized = effects.finalization.is_some(),
            "Overdue assignment skipped"
        );

        self.notifier
            .dispatch(self.render_intents(&effects.notifications, &thesis, true));

        Ok(true)
    }

    // ========================================================================
    // Archive gate
    // ========================================================================

    pub async fn approve_archive(&self, actor: Actor, thesis_id: Uuid) -> Result<()> {
        actor.require_role(&[Role::ProgramHead, Role::Admin])?;

        let thesis = self
            .repo
            .find_thesis(thesis_id)
            .await?
            .ok_or_else(|| AppError::not_found("thesis", thesis_id))?;
        if thesis.routing_status != RoutingStatus::PendingArchive {
            return Err(AppError::invalid_state(
                "Thesis is not pending archive approval",
            ));
        }

        self.repo
            .set_thesis_routing_status(self.repo.write_conn(), thesis.id, RoutingStatus::Archived)
            .await?;

        metrics::record_archive_decision(true);
        info!(thesis_id = %thesis.id, "Thesis archived");

        self.notifier.dispatch(vec![NewNotification {
            user_id: thesis.user_id,
            kind: NotificationKind::Archived,
            title: "Thesis archived".into(),
            message: format!(
                "Your thesis \"{}\" has been approved and archived.",
                thesis.title
            ),
            thesis_id: Some(thesis.id),
        }]);

        Ok(())
    }

    pub async fn reject_archive(
        &self,
        actor: Actor,
        thesis_id: Uuid,
        comment: Option<String>,
    ) -> Result<()> {
        actor.require_role(&[Role::ProgramHead, Role::Admin])?;

        let thesis = self
            .repo
            .find_thesis(thesis_id)
            .await?
            .ok_or_else(|| AppError::not_found("thesis", thesis_id))?;
        if thesis.routing_status != RoutingStatus::PendingArchive {
            return Err(AppError::invalid_state(
                "Thesis is not pending archive approval",
            ));
        }

        let txn = self.repo.write_conn().begin().await?;
        self.repo
            .set_thesis_routing_status(&txn, thesis.id, RoutingStatus::InRouting)
            .await?;
        if let Some(schedule) = self.repo.lock_schedule_by_thesis(&txn, thesis.id).await? {
            self.repo
                .set_schedule_status(&txn, schedule.id, ScheduleStatus::Active)
                .await?;
        }
        txn.commit().await?;

        metrics::record_archive_decision(false);
        info!(thesis_id = %thesis.id, "Archive rejected, routing reopened");

        self.notifier.dispatch(vec![NewNotification {
            user_id: thesis.user_id,
            kind: NotificationKind::ArchiveRejected,
            title: "Archive request rejected".into(),
            message: archive_rejected_message(&thesis.title, comment.as_deref()),
            thesis_id: Some(thesis.id),
        }]);

        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Role-scoped schedule listing: admins see everything, reviewers the
    /// schedules they appear in, everyone else their own theses
    pub async fn list_schedules(&self, actor: Actor) -> Result<Vec<ScheduleDetail>> {
        let bundles = match actor.role {
            Role::Admin => self.repo.list_all_bundles().await?,
            Role::PeerReviewer => self.repo.list_bundles_for_reviewer(actor.id).await?,
            _ => self.repo.list_bundles_for_owner(actor.id).await?,
        };

        let mut ids: Vec<Uuid> = Vec::new();
        for bundle in &bundles {
            ids.extend(ScheduleDetail::referenced_user_ids(bundle));
        }
        ids.sort_unstable();
        ids.dedup();
        let users = self.repo.user_map(&ids).await?;

        Ok(bundles
            .iter()
            .map(|b| ScheduleDetail::from_bundle(b, &users))
            .collect())
    }

    pub async fn get_schedule(&self, actor: Actor, schedule_id: Uuid) -> Result<ScheduleDetail> {
        let bundle = self
            .repo
            .load_schedule_bundle(schedule_id)
            .await?
            .ok_or_else(|| AppError::not_found("schedule", schedule_id))?;

        let is_owner = bundle.thesis.user_id == actor.id;
        let is_reviewer = bundle
            .rounds
            .iter()
            .flat_map(|r| r.assignments.iter())
            .any(|a| a.reviewer_id == actor.id);
        if !actor.is_admin() && !is_owner && !is_reviewer {
            return Err(AppError::forbidden("Not a participant in this schedule"));
        }

        self.detail(&bundle).await
    }

    /// Admin override of the schedule status (manual cancellation and the
    /// escape hatch for schedules reopened after the round ceiling)
    pub async fn update_schedule_status(
        &self,
        actor: Actor,
        schedule_id: Uuid,
        status: ScheduleStatus,
    ) -> Result<ScheduleDetail> {
        actor.require_role(&[Role::Admin])?;

        let schedule = self
            .repo
            .find_schedule(schedule_id)
            .await?
            .ok_or_else(|| AppError::not_found("schedule", schedule_id))?;
        self.repo
            .set_schedule_status(self.repo.write_conn(), schedule.id, status)
            .await?;

        info!(schedule_id = %schedule.id, status = ?status, "Schedule status overridden");

        self.load_detail(schedule.id).await
    }

    /// Assignment detail for its reviewer, including what lower-order
    /// reviewers in the round said
    pub async fn get_assignment(
        &self,
        actor: Actor,
        assignment_id: Uuid,
    ) -> Result<AssignmentContext> {
        let assignment = self
            .repo
            .find_assignment(assignment_id)
            .await?
            .ok_or_else(|| AppError::not_found("assignment", assignment_id))?;
        if assignment.reviewer_id != actor.id {
            return Err(AppError::forbidden("You are not the assigned reviewer"));
        }

        let round = self
            .repo
            .find_round(assignment.round_id)
            .await?
            .ok_or_else(|| AppError::not_found("round", assignment.round_id))?;
        let schedule = self
            .repo
            .find_schedule(round.schedule_id)
            .await?
            .ok_or_else(|| AppError::not_found("schedule", round.schedule_id))?;
        let thesis = self
            .repo
            .find_thesis(schedule.thesis_id)
            .await?
            .ok_or_else(|| AppError::not_found("thesis", schedule.thesis_id))?;

        let siblings = self.repo.assignments_for_round(round.id).await?;
        let mut ids: Vec<Uuid> = siblings.iter().map(|a| a.reviewer_id).collect();
        ids.push(thesis.user_id);
        ids.sort_unstable();
        ids.dedup();
        let users = self.repo.user_map(&ids).await?;

        let prior_reviews = siblings
            .iter()
            .filter(|a| a.order < assignment.order)
            .map(|a| PriorReview {
                reviewer_name: users.get(&a.reviewer_id).map(|u| u.name.clone()),
                order: a.order,
                comment: a.comment.clone(),
                approved: a.approved,
            })
            .collect();

        Ok(AssignmentContext {
            id: assignment.id,
            order: assignment.order,
            deadline: assignment.deadline,
            status: assignment.status,
            comment: assignment.comment,
            approved: assignment.approved,
            reviewed_at: assignment.reviewed_at,
            round: RoundSummary {
                id: round.id,
                round_number: round.round_number,
                status: round.status,
                thesis_file_url: round.thesis_file_url,
            },
            schedule_id: schedule.id,
            thesis: ThesisSummary::new(&thesis, &users),
            prior_reviews,
        })
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn apply_round_effects(
        &self,
        txn: &sea_orm::DatabaseTransaction,
        schedule_id: Uuid,
        round_id: Uuid,
        thesis_id: Uuid,
        effects: &RoundEffects,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if let Some(next) = &effects.activate_next {
            self.repo
                .activate_assignment(txn, next.assignment_id)
                .await?;
        }
        if effects.round_completed {
            self.repo.complete_round(txn, round_id, now).await?;
        }
        if effects.finalization.is_some() {
            self.repo
                .set_thesis_routing_status(txn, thesis_id, RoutingStatus::PendingArchive)
                .await?;
            self.repo
                .set_schedule_status(txn, schedule_id, ScheduleStatus::Completed)
                .await?;
        }
        Ok(())
    }

    /// Render transition intents into concrete notifications. `escalated`
    /// switches to the "previous reviewer did not respond in time" wording.
    fn render_intents(
        &self,
        intents: &[NotificationIntent],
        thesis: &Thesis,
        escalated: bool,
    ) -> Vec<NewNotification> {
        intents
            .iter()
            .map(|intent| match intent {
                NotificationIntent::ReviewerTurn { reviewer_id } => NewNotification {
                    user_id: *reviewer_id,
                    kind: NotificationKind::ReviewDue,
                    title: if escalated {
                        "Review now active".into()
                    } else {
                        "Your turn to review".into()
                    },
                    message: if escalated {
                        format!(
                            "Previous reviewer did not respond in time. You can now review \"{}\".",
                            thesis.title
                        )
                    } else {
                        format!(
                            "You can now review \"{}\". Previous reviewer left feedback.",
                            thesis.title
                        )
                    },
                    thesis_id: Some(thesis.id),
                },
                NotificationIntent::RoundComplete { round_number } => NewNotification {
                    user_id: thesis.user_id,
                    kind: NotificationKind::RoundComplete,
                    title: "Routing round complete".into(),
                    message: if escalated {
                        format!(
                            "Round {} for \"{}\" is complete (one reviewer did not respond in time). You may submit a revision to start the next round.",
                            round_number, thesis.title
                        )
                    } else {
                        format!(
                            "Round {} for \"{}\" is complete. You may submit a revision to start the next round.",
                            round_number, thesis.title
                        )
                    },
                    thesis_id: Some(thesis.id),
                },
                NotificationIntent::ReadyForArchive {
                    round_number,
                    all_approved,
                } => NewNotification {
                    user_id: thesis.user_id,
                    kind: NotificationKind::PendingArchive,
                    title: "Ready for archive".into(),
                    message: if *all_approved {
                        format!(
                            "All reviewers in round {} for \"{}\" approved the thesis. Awaiting program head archive decision.",
                            round_number, thesis.title
                        )
                    } else {
                        format!(
                            "All {} routing rounds for \"{}\" are complete. Awaiting program head approval.",
                            self.policy.max_rounds, thesis.title
                        )
                    },
                    thesis_id: Some(thesis.id),
                },
            })
            .collect()
    }

    /// Per-reviewer notifications when a round's assignments are created
    fn review_assigned_notifications(
        &self,
        thesis: &Thesis,
        planned: &[policy::PlannedAssignment],
        round_number: i32,
        revision: bool,
    ) -> Vec<NewNotification> {
        let total = planned.len();
        planned
            .iter()
            .map(|p| {
                let deadline = p.deadline.format("%Y-%m-%d");
                let (title, message) = if revision {
                    let position = if p.order == 1 {
                        "for your review as the first reviewer".to_string()
                    } else {
                        format!("(you are reviewer {})", p.order)
                    };
                    (
                        "New revision to review".to_string(),
                        format!(
                            "Round {} revision for \"{}\" is ready {}. Deadline: {}.",
                            round_number, thesis.title, position, deadline
                        ),
                    )
                } else {
                    (
                        "Review assigned".to_string(),
                        format!(
                            "You have been assigned to review \"{}\" (reviewer {} of {}). Deadline: {}.",
                            thesis.title, p.order, total, deadline
                        ),
                    )
                };
                NewNotification {
                    user_id: p.reviewer_id,
                    kind: NotificationKind::ReviewAssigned,
                    title,
                    message,
                    thesis_id: Some(thesis.id),
                }
            })
            .collect()
    }

    async fn detail(&self, bundle: &ScheduleBundle) -> Result<ScheduleDetail> {
        let ids = ScheduleDetail::referenced_user_ids(bundle);
        let users = self.repo.user_map(&ids).await?;
        Ok(ScheduleDetail::from_bundle(bundle, &users))
    }

    async fn load_detail(&self, schedule_id: Uuid) -> Result<ScheduleDetail> {
        let bundle = self
            .repo
            .load_schedule_bundle(schedule_id)
            .await?
            .ok_or_else(|| AppError::not_found("schedule", schedule_id))?;
        self.detail(&bundle).await
    }
}

/// Project a persisted round into the state machine's view
fn round_state(round: &RoundWithAssignments) -> RoundState {
    RoundState {
        id: round.round.id,
        round_number: round.round.round_number,
        status: round.round.status,
        assignments: round
            .assignments
            .iter()
            .map(|a| AssignmentState {
                id: a.id,
                reviewer_id: a.reviewer_id,
                order: a.order,
                status: a.status,
                deadline: a.deadline.with_timezone(&Utc),
            })
            .collect(),
    }
}

/// Shape of the next round: its number and the reviewer-order template
/// taken from round 1
#[derive(Debug, Clone, PartialEq, Eq)]
struct NextRoundPlan {
    round_number: i32,
    reviewer_ids: Vec<Uuid>,
}

/// Decide whether another round may start, and with whom. Rejects an open
/// round, an exhausted round count, and a schedule missing its round-1
/// reviewer template.
fn next_round_plan(
    rounds: &[RoundWithAssignments],
    max_rounds: u32,
) -> Result<NextRoundPlan> {
    if rounds
        .iter()
        .any(|r| r.round.status == RoundStatus::InProgress)
    {
        return Err(AppError::invalid_state(
            "A review round is already in progress",
        ));
    }

    let next_round_number = rounds.len() as u32 + 1;
    if next_round_number > max_rounds {
        return Err(AppError::invalid_state(format!(
            "All {} rounds are already complete",
            max_rounds
        )));
    }

    let first_round = rounds
        .first()
        .filter(|r| !r.assignments.is_empty())
        .ok_or_else(|| AppError::invalid_state("Invalid schedule: round 1 assignments missing"))?;

    Ok(NextRoundPlan {
        round_number: next_round_number as i32,
        reviewer_ids: first_round
            .assignments
            .iter()
            .map(|a| a.reviewer_id)
            .collect(),
    })
}

fn archive_rejected_message(title: &str, comment: Option<&str>) -> String {
    match comment.map(str::trim) {
        Some(c) if !c.is_empty() => format!(
            "Your thesis \"{}\" was not archived. Program head comments: {}",
            title, c
        ),
        _ => format!(
            "Your thesis \"{}\" was not archived. Please revise according to the panel feedback and continue routing.",
            title
        ),
    }
}

/// Map a lost race on the schedules' thesis_id unique constraint to the
/// same error a sequential duplicate-create gets
fn duplicate_schedule_guard(err: AppError) -> AppError {
    match err {
        AppError::Database(db_err)
            if matches!(db_err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) =>
        {
            AppError::invalid_state("Thesis already has a routing schedule")
        }
        other => other,
    }
}

fn find_assignment(
    rounds: &[RoundWithAssignments],
    assignment_id: Uuid,
) -> Option<(&RoundWithAssignments, &Assignment)> {
    rounds.iter().find_map(|round| {
        round
            .assignments
            .iter()
            .find(|a| a.id == assignment_id)
            .map(|a| (round, a))
    })
}

fn map_transition_error(err: TransitionError) -> AppError {
    match err {
        TransitionError::AssignmentNotFound => {
            AppError::not_found("assignment", "in round")
        }
        TransitionError::RoundNotInProgress => {
            AppError::invalid_state("Round is not in progress")
        }
        TransitionError::AssignmentNotInProgress => {
            AppError::invalid_state("Assignment is not in progress")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::files::LocalFileStore;
    use sea_orm::DatabaseConnection;

    fn engine() -> RoutingEngine {
        let pool = crate::db::DbPool {
            primary: DatabaseConnection::default(),
            replica: None,
        };
        let config = AppConfig::default();
        RoutingEngine::new(
            Repository::new(pool.clone()),
            Notifier::new(pool),
            Arc::new(LocalFileStore::new(&config.routing)),
            RoutingPolicy::default(),
        )
    }

    fn thesis() -> Thesis {
        Thesis {
            id: Uuid::new_v4(),
            title: "Adaptive Fault Tolerance".into(),
            user_id: Uuid::new_v4(),
            file_url: Some("/uploads/1-thesis.pdf".into()),
            routing_status: RoutingStatus::InRouting,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[test]
    fn reviewer_turn_wording_depends_on_escalation() {
        let engine = engine();
        let thesis = thesis();
        let reviewer = Uuid::new_v4();
        let intents = vec![NotificationIntent::ReviewerTurn {
            reviewer_id: reviewer,
        }];

        let normal = engine.render_intents(&intents, &thesis, false);
        assert_eq!(normal.len(), 1);
        assert_eq!(normal[0].user_id, reviewer);
        assert_eq!(normal[0].kind, NotificationKind::ReviewDue);
        assert_eq!(normal[0].title, "Your turn to review");

        let escalated = engine.render_intents(&intents, &thesis, true);
        assert_eq!(escalated[0].title, "Review now active");
        assert!(escalated[0].message.contains("did not respond in time"));
    }

    #[test]
    fn ready_for_archive_wording_distinguishes_ceiling() {
        let engine = engine();
        let thesis = thesis();

        let unanimous = engine.render_intents(
            &[NotificationIntent::ReadyForArchive {
                round_number: 1,
                all_approved: true,
            }],
            &thesis,
            false,
        );
        assert_eq!(unanimous[0].user_id, thesis.user_id);
        assert_eq!(unanimous[0].kind, NotificationKind::PendingArchive);
        assert!(unanimous[0].message.contains("All reviewers in round 1"));

        let ceiling = engine.render_intents(
            &[NotificationIntent::ReadyForArchive {
                round_number: 3,
                all_approved: false,
            }],
            &thesis,
            false,
        );
        assert!(ceiling[0].message.contains("All 3 routing rounds"));
    }

    fn round_with_reviewers(
        round_number: i32,
        status: RoundStatus,
        reviewer_ids: &[Uuid],
    ) -> RoundWithAssignments {
        let round_id = Uuid::new_v4();
        RoundWithAssignments {
            round: crate::db::models::Round {
                id: round_id,
                schedule_id: Uuid::new_v4(),
                round_number,
                status,
                thesis_file_url: None,
                started_at: Some(Utc::now().into()),
                completed_at: None,
            },
            assignments: reviewer_ids
                .iter()
                .enumerate()
                .map(|(index, &reviewer_id)| Assignment {
                    id: Uuid::new_v4(),
                    round_id,
                    reviewer_id,
                    order: index as i32 + 1,
                    deadline: Utc::now().into(),
                    status: crate::db::models::AssignmentStatus::Approved,
                    comment: None,
                    approved: Some(true),
                    reviewed_at: None,
                })
                .collect(),
        }
    }

    #[test]
    fn next_round_rejected_while_a_round_is_open() {
        let reviewers = [Uuid::new_v4(), Uuid::new_v4()];
        let rounds = vec![round_with_reviewers(1, RoundStatus::InProgress, &reviewers)];
        let err = next_round_plan(&rounds, 3).unwrap_err();
        assert!(matches!(err, AppError::InvalidState { .. }));
    }

    #[test]
    fn next_round_rejected_when_rounds_exhausted() {
        let reviewers = [Uuid::new_v4()];
        let rounds = vec![
            round_with_reviewers(1, RoundStatus::Completed, &reviewers),
            round_with_reviewers(2, RoundStatus::Completed, &reviewers),
            round_with_reviewers(3, RoundStatus::Completed, &reviewers),
        ];
        let err = next_round_plan(&rounds, 3).unwrap_err();
        assert!(err.to_string().contains("All 3 rounds are already complete"));
    }

    #[test]
    fn next_round_reuses_round_one_reviewer_order() {
        let reviewers = [Uuid::new_v4(), Uuid::new_v4()];
        let rounds = vec![round_with_reviewers(1, RoundStatus::Completed, &reviewers)];
        let plan = next_round_plan(&rounds, 3).unwrap();
        assert_eq!(plan.round_number, 2);
        assert_eq!(plan.reviewer_ids, reviewers);
    }

    #[test]
    fn archive_rejection_embeds_program_head_comment() {
        let with_comment =
            archive_rejected_message("Adaptive Fault Tolerance", Some("needs citations"));
        assert!(with_comment.contains("needs citations"));
        assert!(with_comment.contains("Adaptive Fault Tolerance"));

        let generic = archive_rejected_message("Adaptive Fault Tolerance", None);
        assert!(generic.contains("revise according to the panel feedback"));
        let blank = archive_rejected_message("Adaptive Fault Tolerance", Some("   "));
        assert_eq!(blank, generic);
    }

    #[test]
    fn duplicate_schedule_guard_leaves_other_errors_alone() {
        let validation = duplicate_schedule_guard(AppError::validation("bad input"));
        assert!(matches!(validation, AppError::Validation { .. }));

        let db = duplicate_schedule_guard(AppError::Database(sea_orm::DbErr::RecordNotUpdated));
        assert!(matches!(db, AppError::Database(_)));
    }

    #[test]
    fn review_assignment_wording_includes_deadline_and_position() {
        let engine = engine();
        let thesis = thesis();
        let start = Utc::now();
        let planned = engine
            .policy
            .plan_assignments(&[Uuid::new_v4(), Uuid::new_v4()], start);

        let created = engine.review_assigned_notifications(&thesis, &planned, 1, false);
        assert_eq!(created.len(), 2);
        assert_eq!(created[0].kind, NotificationKind::ReviewAssigned);
        assert!(created[0].message.contains("reviewer 1 of 2"));
        assert!(created[0]
            .message
            .contains(&planned[0].deadline.format("%Y-%m-%d").to_string()));

        let revised = engine.review_assigned_notifications(&thesis, &planned, 2, true);
        assert_eq!(revised[0].title, "New revision to review");
        assert!(revised[0].message.contains("Round 2 revision"));
        assert!(revised[0].message.contains("first reviewer"));
        assert!(revised[1].message.contains("you are reviewer 2"));
    }
}
