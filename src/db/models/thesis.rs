//! Thesis entity
//!
//! The thesis record itself is owned by the archive application; this
//! service consumes `file_url` and owns the `routing_status` field.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Routing lifecycle of a thesis
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoutingStatus {
    /// Draft; not yet submitted by the owner
    #[sea_orm(string_value = "NONE")]
    None,
    /// Submitted, awaiting an admin to create a routing schedule
    #[sea_orm(string_value = "PENDING_REVIEW")]
    PendingReview,
    /// A routing schedule is active
    #[sea_orm(string_value = "IN_ROUTING")]
    InRouting,
    /// Routing complete, awaiting the program head's archive decision
    #[sea_orm(string_value = "PENDING_ARCHIVE")]
    PendingArchive,
    /// Archived; terminal unless explicitly reopened
    #[sea_orm(string_value = "ARCHIVED")]
    Archived,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "theses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    /// Thesis owner (the student who submitted it)
    pub user_id: Uuid,

    /// Reference to the uploaded document; opaque to this service
    #[sea_orm(column_type = "Text", nullable)]
    pub file_url: Option<String>,

    pub routing_status: RoutingStatus,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::schedule::Entity")]
    Schedule,
}

impl Related<super::schedule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Schedule.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_status_wire_form() {
        assert_eq!(
            serde_json::to_string(&RoutingStatus::PendingArchive).unwrap(),
            "\"PENDING_ARCHIVE\""
        );
        assert_eq!(
            serde_json::from_str::<RoutingStatus>("\"IN_ROUTING\"").unwrap(),
            RoutingStatus::InRouting
        );
    }
}
