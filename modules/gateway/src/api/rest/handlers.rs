//! REST handlers: wire translation only, no domain logic.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::Path;
use axum::http::Uri;
use axum::{Extension, Json};
use http::StatusCode;
use tracing::info;

use crate::api::rest::dto::{
    CreateSessionReq, CreateSessionResp, MakeInstanceReq, NoteErrorReq, ProjectionResp,
    ServiceInstanceDto, StartDiscoveryReq, StartProviderReq,
};
use crate::api::rest::error::{domain_error_to_problem, Problem};
use crate::domain::service::GatewayService;

/// POST /api/v1/sessions
pub async fn create_session(
    Extension(svc): Extension<Arc<GatewayService>>,
    uri: Uri,
    Json(req): Json<CreateSessionReq>,
) -> Result<(StatusCode, Json<CreateSessionResp>), Problem> {
    info!("Opening session");

    match svc.create_session(&req.connection).await {
        Ok(session_id) => Ok((
            StatusCode::CREATED,
            Json(CreateSessionResp { session_id }),
        )),
        Err(e) => Err(domain_error_to_problem(&e, uri.path())),
    }
}

/// DELETE /api/v1/sessions/{session}
pub async fn close_session(
    Extension(svc): Extension<Arc<GatewayService>>,
    uri: Uri,
    Path(session): Path<String>,
) -> Result<StatusCode, Problem> {
    match svc.close_session(&session).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => Err(domain_error_to_problem(&e, uri.path())),
    }
}

/// POST /api/v1/instances
#[allow(clippy::unused_async)] // axum handlers are async
pub async fn make_instance(
    Json(req): Json<MakeInstanceReq>,
) -> Json<ServiceInstanceDto> {
    let inst = GatewayService::make_instance(&req.name, req.payload, req.port);
    Json(inst.into())
}

/// POST /api/v1/sessions/{session}/discoveries
pub async fn start_discovery(
    Extension(svc): Extension<Arc<GatewayService>>,
    uri: Uri,
    Path(session): Path<String>,
    Json(req): Json<StartDiscoveryReq>,
) -> Result<(StatusCode, Json<ProjectionResp>), Problem> {
    let self_instance = req.self_instance.map(Into::into);
    match svc
        .start_discovery(&session, &req.base_path, self_instance)
        .await
    {
        Ok(resource_id) => Ok((StatusCode::CREATED, Json(ProjectionResp { resource_id }))),
        Err(e) => Err(domain_error_to_problem(&e, uri.path())),
    }
}

/// POST /api/v1/sessions/{session}/providers
pub async fn start_provider(
    Extension(svc): Extension<Arc<GatewayService>>,
    uri: Uri,
    Path(session): Path<String>,
    Json(req): Json<StartProviderReq>,
) -> Result<(StatusCode, Json<ProjectionResp>), Problem> {
    match svc
        .start_provider(
            &session,
            &req.discovery_id,
            &req.service_name,
            req.strategy,
            Duration::from_millis(req.down_timeout_ms),
            req.down_error_threshold,
        )
        .await
    {
        Ok(resource_id) => Ok((StatusCode::CREATED, Json(ProjectionResp { resource_id }))),
        Err(e) => Err(domain_error_to_problem(&e, uri.path())),
    }
}

/// GET /api/v1/sessions/{session}/providers/{provider}/instance
pub async fn get_instance(
    Extension(svc): Extension<Arc<GatewayService>>,
    uri: Uri,
    Path((session, provider)): Path<(String, String)>,
) -> Result<Json<ServiceInstanceDto>, Problem> {
    match svc.get_instance(&session, &provider).await {
        Ok(inst) => Ok(Json(inst.into())),
        Err(e) => Err(domain_error_to_problem(&e, uri.path())),
    }
}

/// GET /api/v1/sessions/{session}/providers/{provider}/instances
pub async fn get_all_instances(
    Extension(svc): Extension<Arc<GatewayService>>,
    uri: Uri,
    Path((session, provider)): Path<(String, String)>,
) -> Result<Json<Vec<ServiceInstanceDto>>, Problem> {
    match svc.get_all_instances(&session, &provider).await {
        Ok(instances) => Ok(Json(instances.into_iter().map(Into::into).collect())),
        Err(e) => Err(domain_error_to_problem(&e, uri.path())),
    }
}

/// POST /api/v1/sessions/{session}/providers/{provider}/errors
pub async fn note_error(
    Extension(svc): Extension<Arc<GatewayService>>,
    uri: Uri,
    Path((session, provider)): Path<(String, String)>,
    Json(req): Json<NoteErrorReq>,
) -> Result<StatusCode, Problem> {
    match svc.note_error(&session, &provider, &req.instance_id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => Err(domain_error_to_problem(&e, uri.path())),
    }
}

/// DELETE /api/v1/sessions/{session}/resources/{resource}
pub async fn close_resource(
    Extension(svc): Extension<Arc<GatewayService>>,
    uri: Uri,
    Path((session, resource)): Path<(String, String)>,
) -> Result<StatusCode, Problem> {
    match svc.close_resource(&session, &resource).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => Err(domain_error_to_problem(&e, uri.path())),
    }
}
