//! Routing round entity
//!
//! One pass of sequential peer review within a schedule. Round numbers are a
//! gapless prefix of 1..=3 and at most one round per schedule is in progress.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Round lifecycle
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundStatus {
    #[sea_orm(string_value = "IN_PROGRESS")]
    InProgress,
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "routing_rounds")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub schedule_id: Uuid,

    pub round_number: i32,

    pub status: RoundStatus,

    /// Snapshot of the document version reviewed in this round
    #[sea_orm(column_type = "Text", nullable)]
    pub thesis_file_url: Option<String>,

    pub started_at: Option<DateTimeWithTimeZone>,

    pub completed_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::schedule::Entity",
        from = "Column::ScheduleId",
        to = "super::schedule::Column::Id"
    )]
    Schedule,

    #[sea_orm(has_many = "super::assignment::Entity")]
    Assignment,
}

impl Related<super::schedule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Schedule.def()
    }
}

impl Related<super::assignment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assignment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
