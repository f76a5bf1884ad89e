//! Routing schedule entity
//!
//! The routing process instance for one thesis; at most one schedule per
//! thesis (`thesis_id` is unique), spanning up to three rounds.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Schedule lifecycle
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleStatus {
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "routing_schedules")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub thesis_id: Uuid,

    /// Admin who created the schedule
    pub admin_id: Uuid,

    pub start_date: DateTimeWithTimeZone,

    pub status: ScheduleStatus,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::thesis::Entity",
        from = "Column::ThesisId",
        to = "super::thesis::Column::Id"
    )]
    Thesis,

    #[sea_orm(has_many = "super::round::Entity")]
    Round,
}

impl Related<super::thesis::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Thesis.def()
    }
}

impl Related<super::round::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Round.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
