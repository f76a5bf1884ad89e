//! Routing workflow endpoints
//!
//! Thin translation layer: request DTOs are validated here, then handed to
//! the engine which owns all workflow semantics.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::auth::Actor;
use crate::db::models::ScheduleStatus;
use crate::engine::{CreateScheduleInput, SubmitReviewInput};
use crate::errors::AppError;
use crate::files::RevisionUpload;

use super::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateScheduleRequest {
    pub thesis_id: Uuid,
    #[validate(length(min = 1, message = "At least one peer reviewer is required"))]
    pub reviewer_ids: Vec<Uuid>,
    pub start_date: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitReviewRequest {
    pub assignment_id: Uuid,
    pub approved: bool,
    #[validate(length(max = 10000, message = "Comment is too long"))]
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateScheduleRequest {
    pub status: ScheduleStatus,
}

#[derive(Serialize)]
pub struct SubmitReviewResponse {
    pub success: bool,
}

#[derive(Serialize)]
pub struct SubmitRevisionResponse {
    pub round_number: i32,
    pub file_url: String,
}

#[derive(Serialize)]
pub struct AdvanceDeadlinesResponse {
    pub advanced: bool,
}

#[instrument(skip(state, payload), fields(actor_id = %actor.id))]
pub async fn create_schedule(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<CreateScheduleRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let detail = state
        .engine
        .create_schedule(
            actor,
            CreateScheduleInput {
                thesis_id: payload.thesis_id,
                reviewer_ids: payload.reviewer_ids,
                start_date: payload.start_date,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(detail)))
}

#[instrument(skip(state), fields(actor_id = %actor.id))]
pub async fn list_schedules(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<impl IntoResponse, AppError> {
    let schedules = state.engine.list_schedules(actor).await?;
    Ok(Json(schedules))
}

#[instrument(skip(state), fields(actor_id = %actor.id))]
pub async fn get_schedule(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let detail = state.engine.get_schedule(actor, id).await?;
    Ok(Json(detail))
}

#[instrument(skip(state, payload), fields(actor_id = %actor.id))]
pub async fn update_schedule_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateScheduleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let detail = state
        .engine
        .update_schedule_status(actor, id, payload.status)
        .await?;
    Ok(Json(detail))
}

#[instrument(skip(state, payload), fields(actor_id = %actor.id))]
pub async fn submit_review(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    state
        .engine
        .submit_review(
            actor,
            id,
            SubmitReviewInput {
                assignment_id: payload.assignment_id,
                approved: payload.approved,
                comment: payload
                    .comment
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty()),
            },
        )
        .await?;

    Ok(Json(SubmitReviewResponse { success: true }))
}

#[instrument(skip(state, multipart), fields(actor_id = %actor.id))]
pub async fn submit_revision(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("revision.pdf").to_string();
            let content_type = field.content_type().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::validation(format!("Failed to read upload: {}", e)))?;
            upload = Some(RevisionUpload {
                filename,
                content_type,
                bytes: bytes.to_vec(),
            });
        }
    }

    let upload = upload.ok_or_else(|| AppError::Validation {
        message: "File is required".into(),
        field: Some("file".into()),
    })?;

    let outcome = state.engine.submit_revision(actor, id, upload).await?;

    Ok(Json(SubmitRevisionResponse {
        round_number: outcome.round_number,
        file_url: outcome.file_url,
    }))
}

#[instrument(skip(state), fields(actor_id = %actor.id))]
pub async fn advance_deadlines(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let advanced = state.engine.advance_deadlines(actor, id).await?;
    Ok(Json(AdvanceDeadlinesResponse { advanced }))
}

#[instrument(skip(state), fields(actor_id = %actor.id))]
pub async fn get_assignment(
    State(state): State<AppState>,
    actor: Actor,
    Path(assignment_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let context = state.engine.get_assignment(actor, assignment_id).await?;
    Ok(Json(context))
}
