pub mod archive;
pub mod health;
pub mod routing;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::engine::RoutingEngine;

/// Headroom for multipart framing on top of the document size limit
const UPLOAD_BODY_SLACK: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub engine: Arc<RoutingEngine>,
}

pub fn create_router(state: AppState) -> Router {
    let request_timeout = state.config.request_timeout();
    let body_limit = state.config.routing.max_upload_bytes + UPLOAD_BODY_SLACK;

    let api_routes = Router::new()
        .route("/routing", get(routing::list_schedules))
        .route("/routing", post(routing::create_schedule))
        .route(
            "/routing/assignment/{assignment_id}",
            get(routing::get_assignment),
        )
        .route("/routing/{id}", get(routing::get_schedule))
        .route("/routing/{id}", put(routing::update_schedule_status))
        .route("/routing/{id}/submit-review", post(routing::submit_review))
        .route(
            "/routing/{id}/submit-revision",
            post(routing::submit_revision),
        )
        .route(
            "/routing/{id}/advance-deadlines",
            post(routing::advance_deadlines),
        )
        .route("/archive/{thesis_id}/approve", post(archive::approve))
        .route("/archive/{thesis_id}/reject", post(archive::reject))
        .layer(DefaultBodyLimit::max(body_limit));

    let health_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check));

    Router::new()
        .merge(api_routes)
        .merge(health_routes)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(request_timeout))
                .layer(CorsLayer::permissive())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}
