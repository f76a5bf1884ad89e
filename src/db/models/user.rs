//! User directory entity
//!
//! Read-only from this service's perspective; used to validate reviewer
//! eligibility and to render names on assignment views.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::auth::Role;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    #[sea_orm(column_type = "Text", unique)]
    pub email: String,

    pub role: Role,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
