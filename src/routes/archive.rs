//! Archive gate endpoints
//!
//! The program head's final decision on a thesis that finished routing.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::auth::Actor;
use crate::errors::AppError;

use super::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct RejectRequest {
    pub comment: Option<String>,
}

#[derive(Serialize)]
pub struct ArchiveDecisionResponse {
    pub success: bool,
}

#[instrument(skip(state), fields(actor_id = %actor.id))]
pub async fn approve(
    State(state): State<AppState>,
    actor: Actor,
    Path(thesis_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.engine.approve_archive(actor, thesis_id).await?;
    Ok(Json(ArchiveDecisionResponse { success: true }))
}

#[instrument(skip(state, payload), fields(actor_id = %actor.id))]
pub async fn reject(
    State(state): State<AppState>,
    actor: Actor,
    Path(thesis_id): Path<Uuid>,
    payload: Option<Json<RejectRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let comment = payload.and_then(|Json(p)| p.comment);
    state.engine.reject_archive(actor, thesis_id, comment).await?;
    Ok(Json(ArchiveDecisionResponse { success: true }))
}
