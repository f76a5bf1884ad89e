//! Notification entity (append-only sink)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Notification categories emitted by the routing workflow
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    /// Owner: a schedule was created for their thesis
    #[sea_orm(string_value = "ROUTING_ASSIGNED")]
    RoutingAssigned,
    /// Reviewer: added to a round
    #[sea_orm(string_value = "REVIEW_ASSIGNED")]
    ReviewAssigned,
    /// Reviewer: their assignment became active
    #[sea_orm(string_value = "REVIEW_DUE")]
    ReviewDue,
    /// Owner: a round finished, revision wanted
    #[sea_orm(string_value = "ROUND_COMPLETE")]
    RoundComplete,
    /// Owner: routing finished, awaiting the archive gate
    #[sea_orm(string_value = "PENDING_ARCHIVE")]
    PendingArchive,
    /// Owner: thesis archived
    #[sea_orm(string_value = "ARCHIVED")]
    Archived,
    /// Owner: archive request rejected, routing reopened
    #[sea_orm(string_value = "ARCHIVE_REJECTED")]
    ArchiveRejected,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub user_id: Uuid,

    #[sea_orm(column_name = "type")]
    pub kind: NotificationKind,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub message: String,

    pub thesis_id: Option<Uuid>,

    pub is_read: bool,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
