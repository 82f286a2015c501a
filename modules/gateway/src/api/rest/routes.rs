//! Route table for the gateway REST surface.

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::{Extension, Router};

use crate::api::rest::handlers;
use crate::domain::service::GatewayService;

/// Build the full `/api/v1` route tree with `service` injected.
pub fn router(service: Arc<GatewayService>) -> Router {
    Router::new()
        .route("/api/v1/instances", post(handlers::make_instance))
        .route("/api/v1/sessions", post(handlers::create_session))
        .route(
            "/api/v1/sessions/{session}",
            delete(handlers::close_session),
        )
        .route(
            "/api/v1/sessions/{session}/discoveries",
            post(handlers::start_discovery),
        )
        .route(
            "/api/v1/sessions/{session}/providers",
            post(handlers::start_provider),
        )
        .route(
            "/api/v1/sessions/{session}/providers/{provider}/instance",
            get(handlers::get_instance),
        )
        .route(
            "/api/v1/sessions/{session}/providers/{provider}/instances",
            get(handlers::get_all_instances),
        )
        .route(
            "/api/v1/sessions/{session}/providers/{provider}/errors",
            post(handlers::note_error),
        )
        .route(
            "/api/v1/sessions/{session}/resources/{resource}",
            delete(handlers::close_resource),
        )
        .layer(Extension(service))
}
