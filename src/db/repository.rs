//! Repository pattern for routing data access
//!
//! Plain reads go to the read connection. Everything a state transition
//! touches goes through the generic-connection methods so the engine can
//! run them inside one transaction, with the schedule row exclusively
//! locked as the serialization point for the whole hierarchy.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use crate::db::models::*;
use crate::db::DbPool;
use crate::engine::policy::PlannedAssignment;
use crate::errors::Result;

/// One round together with its assignments, in activation order
#[derive(Debug, Clone)]
pub struct RoundWithAssignments {
    pub round: Round,
    pub assignments: Vec<Assignment>,
}

/// A schedule with its full hierarchy, as served by the query surface
#[derive(Debug, Clone)]
pub struct ScheduleBundle {
    pub schedule: Schedule,
    pub thesis: Thesis,
    pub rounds: Vec<RoundWithAssignments>,
}

/// Repository for routing data access
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    pub fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Thesis / user directory
    // ========================================================================

    pub async fn find_thesis(&self, id: Uuid) -> Result<Option<Thesis>> {
        ThesisEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Thesis lookup on an explicit connection (for use inside transactions)
    pub async fn find_thesis_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: Uuid,
    ) -> Result<Option<Thesis>> {
        ThesisEntity::find_by_id(id)
            .one(conn)
            .await
            .map_err(Into::into)
    }

    pub async fn find_users_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        UserEntity::find()
            .filter(UserColumn::Id.is_in(ids.iter().copied()))
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Map of users keyed by id, for rendering reviewer/owner summaries
    pub async fn user_map(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, User>> {
        let users = self.find_users_by_ids(ids).await?;
        Ok(users.into_iter().map(|u| (u.id, u)).collect())
    }

    // ========================================================================
    // Schedule reads
    // ========================================================================

    pub async fn find_schedule(&self, id: Uuid) -> Result<Option<Schedule>> {
        ScheduleEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn find_schedule_by_thesis(&self, thesis_id: Uuid) -> Result<Option<Schedule>> {
        ScheduleEntity::find()
            .filter(ScheduleColumn::ThesisId.eq(thesis_id))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn find_assignment(&self, id: Uuid) -> Result<Option<Assignment>> {
        AssignmentEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Assignments of one round in activation order
    pub async fn assignments_for_round(&self, round_id: Uuid) -> Result<Vec<Assignment>> {
        AssignmentEntity::find()
            .filter(AssignmentColumn::RoundId.eq(round_id))
            .order_by_asc(AssignmentColumn::Order)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn find_round(&self, id: Uuid) -> Result<Option<Round>> {
        RoundEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Round hierarchy of one schedule, on the read connection
    pub async fn schedule_rounds(&self, schedule_id: Uuid) -> Result<Vec<RoundWithAssignments>> {
        self.rounds_with_assignments(self.read_conn(), schedule_id)
            .await
    }

    /// Load one schedule with its thesis and full round/assignment hierarchy
    pub async fn load_schedule_bundle(&self, id: Uuid) -> Result<Option<ScheduleBundle>> {
        let Some(schedule) = self.find_schedule(id).await? else {
            return Ok(None);
        };
        let bundles = self.hydrate_bundles(vec![schedule]).await?;
        Ok(bundles.into_iter().next())
    }

    /// All schedules, newest first (admin view)
    pub async fn list_all_bundles(&self) -> Result<Vec<ScheduleBundle>> {
        let schedules = ScheduleEntity::find()
            .order_by_desc(ScheduleColumn::CreatedAt)
            .all(self.read_conn())
            .await?;
        self.hydrate_bundles(schedules).await
    }

    /// Schedules containing an assignment for the given reviewer
    pub async fn list_bundles_for_reviewer(&self, reviewer_id: Uuid) -> Result<Vec<ScheduleBundle>> {
        let assignments = AssignmentEntity::find()
            .filter(AssignmentColumn::ReviewerId.eq(reviewer_id))
            .all(self.read_conn())
            .await?;
        if assignments.is_empty() {
            return Ok(Vec::new());
        }

        let round_ids: BTreeSet<Uuid> = assignments.iter().map(|a| a.round_id).collect();
        let rounds = RoundEntity::find()
            .filter(RoundColumn::Id.is_in(round_ids))
            .all(self.read_conn())
            .await?;
        let schedule_ids: BTreeSet<Uuid> = rounds.iter().map(|r| r.schedule_id).collect();

        let schedules = ScheduleEntity::find()
            .filter(ScheduleColumn::Id.is_in(schedule_ids))
            .order_by_desc(ScheduleColumn::CreatedAt)
            .all(self.read_conn())
            .await?;
        self.hydrate_bundles(schedules).await
    }

    /// Schedules for theses owned by the given user
    pub async fn list_bundles_for_owner(&self, owner_id: Uuid) -> Result<Vec<ScheduleBundle>> {
        let theses = ThesisEntity::find()
            .filter(ThesisColumn::UserId.eq(owner_id))
            .all(self.read_conn())
            .await?;
        if theses.is_empty() {
            return Ok(Vec::new());
        }

        let thesis_ids: Vec<Uuid> = theses.iter().map(|t| t.id).collect();
        let schedules = ScheduleEntity::find()
            .filter(ScheduleColumn::ThesisId.is_in(thesis_ids))
            .order_by_desc(ScheduleColumn::CreatedAt)
            .all(self.read_conn())
            .await?;
        self.hydrate_bundles(schedules).await
    }

    /// Attach theses and round/assignment hierarchies to a schedule set
    async fn hydrate_bundles(&self, schedules: Vec<Schedule>) -> Result<Vec<ScheduleBundle>> {
        if schedules.is_empty() {
            return Ok(Vec::new());
        }

        let thesis_ids: Vec<Uuid> = schedules.iter().map(|s| s.thesis_id).collect();
        let theses: HashMap<Uuid, Thesis> = ThesisEntity::find()
            .filter(ThesisColumn::Id.is_in(thesis_ids))
            .all(self.read_conn())
            .await?
            .into_iter()
            .map(|t| (t.id, t))
            .collect();

        let schedule_ids: Vec<Uuid> = schedules.iter().map(|s| s.id).collect();
        let rounds = RoundEntity::find()
            .filter(RoundColumn::ScheduleId.is_in(schedule_ids))
            .order_by_asc(RoundColumn::RoundNumber)
            .all(self.read_conn())
            .await?;

        let round_ids: Vec<Uuid> = rounds.iter().map(|r| r.id).collect();
        let mut assignments_by_round: HashMap<Uuid, Vec<Assignment>> = HashMap::new();
        if !round_ids.is_empty() {
            let assignments = AssignmentEntity::find()
                .filter(AssignmentColumn::RoundId.is_in(round_ids))
                .order_by_asc(AssignmentColumn::Order)
                .all(self.read_conn())
                .await?;
            for assignment in assignments {
                assignments_by_round
                    .entry(assignment.round_id)
                    .or_default()
                    .push(assignment);
            }
        }

        let mut rounds_by_schedule: HashMap<Uuid, Vec<RoundWithAssignments>> = HashMap::new();
        for round in rounds {
            let assignments = assignments_by_round.remove(&round.id).unwrap_or_default();
            rounds_by_schedule
                .entry(round.schedule_id)
                .or_default()
                .push(RoundWithAssignments { round, assignments });
        }

        let mut bundles = Vec::with_capacity(schedules.len());
        for schedule in schedules {
            let Some(thesis) = theses.get(&schedule.thesis_id).cloned() else {
                // Orphaned schedule; skip rather than fail the whole listing
                tracing::warn!(schedule_id = %schedule.id, "Schedule references missing thesis");
                continue;
            };
            let rounds = rounds_by_schedule.remove(&schedule.id).unwrap_or_default();
            bundles.push(ScheduleBundle {
                schedule,
                thesis,
                rounds,
            });
        }

        Ok(bundles)
    }

    // ========================================================================
    // Transactional operations
    // ========================================================================

    /// Lock the schedule row for the duration of the transaction. All
    /// transitions on a schedule serialize on this lock.
    pub async fn lock_schedule(
        &self,
        txn: &DatabaseTransaction,
        id: Uuid,
    ) -> Result<Option<Schedule>> {
        ScheduleEntity::find_by_id(id)
            .lock_exclusive()
            .one(txn)
            .await
            .map_err(Into::into)
    }

    /// Lock the schedule belonging to a thesis, if one exists
    pub async fn lock_schedule_by_thesis(
        &self,
        txn: &DatabaseTransaction,
        thesis_id: Uuid,
    ) -> Result<Option<Schedule>> {
        ScheduleEntity::find()
            .filter(ScheduleColumn::ThesisId.eq(thesis_id))
            .lock_exclusive()
            .one(txn)
            .await
            .map_err(Into::into)
    }

    /// Load the round hierarchy on an explicit connection, ordered by round
    /// number and assignment order
    pub async fn rounds_with_assignments<C: ConnectionTrait>(
        &self,
        conn: &C,
        schedule_id: Uuid,
    ) -> Result<Vec<RoundWithAssignments>> {
        let rounds = RoundEntity::find()
            .filter(RoundColumn::ScheduleId.eq(schedule_id))
            .order_by_asc(RoundColumn::RoundNumber)
            .all(conn)
            .await?;

        let mut result = Vec::with_capacity(rounds.len());
        for round in rounds {
            let assignments = AssignmentEntity::find()
                .filter(AssignmentColumn::RoundId.eq(round.id))
                .order_by_asc(AssignmentColumn::Order)
                .all(conn)
                .await?;
            result.push(RoundWithAssignments { round, assignments });
        }

        Ok(result)
    }

    /// Insert a new schedule row
    pub async fn insert_schedule<C: ConnectionTrait>(
        &self,
        conn: &C,
        thesis_id: Uuid,
        admin_id: Uuid,
        start_date: chrono::DateTime<Utc>,
    ) -> Result<Schedule> {
        let now = Utc::now();
        let schedule = ScheduleActiveModel {
            id: Set(Uuid::new_v4()),
            thesis_id: Set(thesis_id),
            admin_id: Set(admin_id),
            start_date: Set(start_date.into()),
            status: Set(ScheduleStatus::Active),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        schedule.insert(conn).await.map_err(Into::into)
    }

    /// Insert a round and its planned assignments atomically (the caller
    /// supplies the connection, normally a transaction)
    pub async fn insert_round_with_assignments<C: ConnectionTrait>(
        &self,
        conn: &C,
        schedule_id: Uuid,
        round_number: i32,
        thesis_file_url: Option<String>,
        started_at: chrono::DateTime<Utc>,
        planned: &[PlannedAssignment],
    ) -> Result<Round> {
        let round = RoundActiveModel {
            id: Set(Uuid::new_v4()),
            schedule_id: Set(schedule_id),
            round_number: Set(round_number),
            status: Set(RoundStatus::InProgress),
            thesis_file_url: Set(thesis_file_url),
            started_at: Set(Some(started_at.into())),
            completed_at: Set(None),
        };
        let round = round.insert(conn).await?;

        let rows: Vec<AssignmentActiveModel> = planned
            .iter()
            .map(|p| AssignmentActiveModel {
                id: Set(Uuid::new_v4()),
                round_id: Set(round.id),
                reviewer_id: Set(p.reviewer_id),
                order: Set(p.order),
                deadline: Set(p.deadline.into()),
                status: Set(p.status),
                comment: Set(None),
                approved: Set(None),
                reviewed_at: Set(None),
            })
            .collect();

        AssignmentEntity::insert_many(rows).exec(conn).await?;

        Ok(round)
    }

    /// Record a submitted review on its assignment
    pub async fn record_review<C: ConnectionTrait>(
        &self,
        conn: &C,
        assignment_id: Uuid,
        status: AssignmentStatus,
        approved: bool,
        comment: Option<String>,
        reviewed_at: chrono::DateTime<Utc>,
    ) -> Result<()> {
        AssignmentActiveModel {
            id: Set(assignment_id),
            status: Set(status),
            approved: Set(Some(approved)),
            comment: Set(comment),
            reviewed_at: Set(Some(reviewed_at.into())),
            ..Default::default()
        }
        .update(conn)
        .await?;
        Ok(())
    }

    /// Mark an overdue assignment skipped
    pub async fn mark_skipped<C: ConnectionTrait>(
        &self,
        conn: &C,
        assignment_id: Uuid,
    ) -> Result<()> {
        AssignmentActiveModel {
            id: Set(assignment_id),
            status: Set(AssignmentStatus::Skipped),
            ..Default::default()
        }
        .update(conn)
        .await?;
        Ok(())
    }

    /// Activate the next assignment in a round
    pub async fn activate_assignment<C: ConnectionTrait>(
        &self,
        conn: &C,
        assignment_id: Uuid,
    ) -> Result<()> {
        AssignmentActiveModel {
            id: Set(assignment_id),
            status: Set(AssignmentStatus::InProgress),
            ..Default::default()
        }
        .update(conn)
        .await?;
        Ok(())
    }

    /// Complete a round
    pub async fn complete_round<C: ConnectionTrait>(
        &self,
        conn: &C,
        round_id: Uuid,
        completed_at: chrono::DateTime<Utc>,
    ) -> Result<()> {
        RoundActiveModel {
            id: Set(round_id),
            status: Set(RoundStatus::Completed),
            completed_at: Set(Some(completed_at.into())),
            ..Default::default()
        }
        .update(conn)
        .await?;
        Ok(())
    }

    /// Update the thesis routing status
    pub async fn set_thesis_routing_status<C: ConnectionTrait>(
        &self,
        conn: &C,
        thesis_id: Uuid,
        status: RoutingStatus,
    ) -> Result<()> {
        ThesisActiveModel {
            id: Set(thesis_id),
            routing_status: Set(status),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .update(conn)
        .await?;
        Ok(())
    }

    /// Update the schedule status
    pub async fn set_schedule_status<C: ConnectionTrait>(
        &self,
        conn: &C,
        schedule_id: Uuid,
        status: ScheduleStatus,
    ) -> Result<()> {
        ScheduleActiveModel {
            id: Set(schedule_id),
            status: Set(status),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .update(conn)
        .await?;
        Ok(())
    }
}
