//! Read models served by the query surface
//!
//! Flattened projections of the schedule hierarchy with user summaries
//! attached, serialized directly by the HTTP layer.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::db::models::{
    Assignment, AssignmentStatus, RoundStatus, RoutingStatus, ScheduleStatus, Thesis, User,
};
use crate::db::{RoundWithAssignments, ScheduleBundle};

#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ThesisSummary {
    pub id: Uuid,
    pub title: String,
    pub user_id: Uuid,
    pub routing_status: RoutingStatus,
    pub file_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<UserSummary>,
}

impl ThesisSummary {
    pub fn new(thesis: &Thesis, users: &HashMap<Uuid, User>) -> Self {
        Self {
            id: thesis.id,
            title: thesis.title.clone(),
            user_id: thesis.user_id,
            routing_status: thesis.routing_status,
            file_url: thesis.file_url.clone(),
            author: users.get(&thesis.user_id).map(UserSummary::from),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AssignmentDetail {
    pub id: Uuid,
    pub reviewer_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer: Option<UserSummary>,
    pub order: i32,
    pub deadline: DateTime<FixedOffset>,
    pub status: AssignmentStatus,
    pub comment: Option<String>,
    pub approved: Option<bool>,
    pub reviewed_at: Option<DateTime<FixedOffset>>,
}

impl AssignmentDetail {
    fn new(assignment: &Assignment, users: &HashMap<Uuid, User>) -> Self {
        Self {
            id: assignment.id,
            reviewer_id: assignment.reviewer_id,
            reviewer: users.get(&assignment.reviewer_id).map(UserSummary::from),
            order: assignment.order,
            deadline: assignment.deadline,
            status: assignment.status,
            comment: assignment.comment.clone(),
            approved: assignment.approved,
            reviewed_at: assignment.reviewed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoundDetail {
    pub id: Uuid,
    pub round_number: i32,
    pub status: RoundStatus,
    pub thesis_file_url: Option<String>,
    pub started_at: Option<DateTime<FixedOffset>>,
    pub completed_at: Option<DateTime<FixedOffset>>,
    pub assignments: Vec<AssignmentDetail>,
}

impl RoundDetail {
    fn new(round: &RoundWithAssignments, users: &HashMap<Uuid, User>) -> Self {
        Self {
            id: round.round.id,
            round_number: round.round.round_number,
            status: round.round.status,
            thesis_file_url: round.round.thesis_file_url.clone(),
            started_at: round.round.started_at,
            completed_at: round.round.completed_at,
            assignments: round
                .assignments
                .iter()
                .map(|a| AssignmentDetail::new(a, users))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleDetail {
    pub id: Uuid,
    pub thesis_id: Uuid,
    pub thesis: ThesisSummary,
    pub admin_id: Uuid,
    pub start_date: DateTime<FixedOffset>,
    pub status: ScheduleStatus,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
    pub rounds: Vec<RoundDetail>,
}

impl ScheduleDetail {
    pub fn from_bundle(bundle: &ScheduleBundle, users: &HashMap<Uuid, User>) -> Self {
        Self {
            id: bundle.schedule.id,
            thesis_id: bundle.schedule.thesis_id,
            thesis: ThesisSummary::new(&bundle.thesis, users),
            admin_id: bundle.schedule.admin_id,
            start_date: bundle.schedule.start_date,
            status: bundle.schedule.status,
            created_at: bundle.schedule.created_at,
            updated_at: bundle.schedule.updated_at,
            rounds: bundle
                .rounds
                .iter()
                .map(|r| RoundDetail::new(r, users))
                .collect(),
        }
    }

    /// Every user id referenced by a bundle (owner + reviewers), for
    /// batching the directory lookup
    pub fn referenced_user_ids(bundle: &ScheduleBundle) -> Vec<Uuid> {
        let mut ids = vec![bundle.thesis.user_id];
        for round in &bundle.rounds {
            for assignment in &round.assignments {
                ids.push(assignment.reviewer_id);
            }
        }
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// What a lower-order reviewer said, shown to later reviewers in the round
#[derive(Debug, Clone, Serialize)]
pub struct PriorReview {
    pub reviewer_name: Option<String>,
    pub order: i32,
    pub comment: Option<String>,
    pub approved: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoundSummary {
    pub id: Uuid,
    pub round_number: i32,
    pub status: RoundStatus,
    pub thesis_file_url: Option<String>,
}

/// An assignment in the context its reviewer needs to act on it
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentContext {
    pub id: Uuid,
    pub order: i32,
    pub deadline: DateTime<FixedOffset>,
    pub status: AssignmentStatus,
    pub comment: Option<String>,
    pub approved: Option<bool>,
    pub reviewed_at: Option<DateTime<FixedOffset>>,
    pub round: RoundSummary,
    pub schedule_id: Uuid,
    pub thesis: ThesisSummary,
    pub prior_reviews: Vec<PriorReview>,
}
