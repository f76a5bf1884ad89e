//! Peer review assignment entity
//!
//! One reviewer's slot within a round. `order` is the 1-based activation
//! rank; `(round_id, review_order)` is unique. Assignments activate strictly
//! in ascending order, one at a time.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Assignment lifecycle
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    /// Waiting for a lower-order assignment to finish
    #[sea_orm(string_value = "PENDING")]
    Pending,
    /// The reviewer's turn; the deadline clock applies
    #[sea_orm(string_value = "IN_PROGRESS")]
    InProgress,
    #[sea_orm(string_value = "APPROVED")]
    Approved,
    #[sea_orm(string_value = "REJECTED")]
    Rejected,
    /// Deadline elapsed without a submission
    #[sea_orm(string_value = "SKIPPED")]
    Skipped,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "peer_review_assignments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub round_id: Uuid,

    pub reviewer_id: Uuid,

    /// 1-based activation rank within the round
    #[sea_orm(column_name = "review_order")]
    pub order: i32,

    pub deadline: DateTimeWithTimeZone,

    pub status: AssignmentStatus,

    #[sea_orm(column_type = "Text", nullable)]
    pub comment: Option<String>,

    pub approved: Option<bool>,

    pub reviewed_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::round::Entity",
        from = "Column::RoundId",
        to = "super::round::Column::Id"
    )]
    Round,
}

impl Related<super::round::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Round.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
