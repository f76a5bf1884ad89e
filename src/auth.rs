//! Capability context for routing operations
//!
//! Token validation happens upstream (the archive's session layer); by the
//! time a request reaches this service the gateway has resolved the caller
//! and forwards identity headers. Every core operation receives the caller
//! as an explicit `Actor { id, role }` and checks capability at entry.

use axum::{extract::FromRequestParts, http::request::Parts};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::{AppError, Result};

/// Header carrying the authenticated user id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the authenticated user role
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// User roles, as persisted in the user directory
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[sea_orm(string_value = "STUDENT")]
    Student,
    #[sea_orm(string_value = "TEACHER")]
    Teacher,
    #[sea_orm(string_value = "PEER_REVIEWER")]
    PeerReviewer,
    #[sea_orm(string_value = "PROGRAM_HEAD")]
    ProgramHead,
    #[sea_orm(string_value = "ADMIN")]
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "STUDENT",
            Role::Teacher => "TEACHER",
            Role::PeerReviewer => "PEER_REVIEWER",
            Role::ProgramHead => "PROGRAM_HEAD",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "STUDENT" => Ok(Role::Student),
            "TEACHER" => Ok(Role::Teacher),
            "PEER_REVIEWER" => Ok(Role::PeerReviewer),
            "PROGRAM_HEAD" => Ok(Role::ProgramHead),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(()),
        }
    }
}

/// The authenticated caller of a routing operation
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Require the actor to hold one of the given roles
    pub fn require_role(&self, allowed: &[Role]) -> Result<()> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden {
                message: format!("Requires one of {:?}", allowed),
            })
        }
    }
}

/// Axum extractor for Actor
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        let id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: format!("Missing or invalid {} header", USER_ID_HEADER),
            })?;

        let role = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Role::from_str(s).ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: format!("Missing or invalid {} header", USER_ROLE_HEADER),
            })?;

        Ok(Actor { id, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [
            Role::Student,
            Role::Teacher,
            Role::PeerReviewer,
            Role::ProgramHead,
            Role::Admin,
        ] {
            assert_eq!(Role::from_str(role.as_str()), Ok(role));
        }
        assert_eq!(Role::from_str("REVIEWER"), Err(()));
    }

    #[test]
    fn test_require_role() {
        let actor = Actor {
            id: Uuid::new_v4(),
            role: Role::PeerReviewer,
        };
        assert!(actor
            .require_role(&[Role::PeerReviewer, Role::Admin])
            .is_ok());
        assert!(actor.require_role(&[Role::Admin]).is_err());
        assert!(!actor.is_admin());
    }
}
