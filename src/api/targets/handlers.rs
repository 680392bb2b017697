use super::dto::{CommandRequest, IntervalRequest, StatusResponse};
use crate::api::AppState;
use crate::protocol::{StatusCategory, Verb};
use crate::registry::{RegistryError, TargetSnapshot};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use tracing::{info, warn};

fn registry_error(e: RegistryError) -> (StatusCode, String) {
    match e {
        RegistryError::UnknownTarget(_) => (StatusCode::NOT_FOUND, e.to_string()),
        RegistryError::InvalidInterval(_) => (StatusCode::BAD_REQUEST, e.to_string()),
    }
}

/// HTTP handler for GET /api/targets
pub(crate) async fn get_targets(State(state): State<AppState>) -> Json<Vec<TargetSnapshot>> {
    Json(state.controller.snapshots())
}

/// HTTP handler for GET /api/targets/{id}
pub(crate) async fn get_target(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TargetSnapshot>, (StatusCode, String)> {
    state
        .controller
        .snapshot(&id)
        .map(Json)
        .map_err(registry_error)
}

/// HTTP handler for GET /api/targets/{id}/status
pub(crate) async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, (StatusCode, String)> {
    let status = state.controller.get_status(&id).map_err(registry_error)?;

    Ok(Json(StatusResponse {
        category: StatusCategory::classify(&status),
        id,
        status,
    }))
}

fn trigger(state: &AppState, id: &str, verb: Verb) -> Result<StatusCode, (StatusCode, String)> {
    info!(target_id = %id, verb = %verb, "Command requested");
    state
        .controller
        .trigger_command(id, verb)
        .map_err(registry_error)?;

    Ok(StatusCode::ACCEPTED)
}

/// HTTP handler for POST /api/targets/{id}/start
///
/// The command runs in the background; its reply shows up in the target's status.
pub(crate) async fn start_target(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    trigger(&state, &id, Verb::Start)
}

/// HTTP handler for POST /api/targets/{id}/stop
pub(crate) async fn stop_target(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    trigger(&state, &id, Verb::Stop)
}

/// HTTP handler for POST /api/targets/{id}/refresh
pub(crate) async fn refresh_target(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    trigger(&state, &id, Verb::Status)
}

/// HTTP handler for PUT /api/targets/{id}/command
pub(crate) async fn update_command(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<TargetSnapshot>, (StatusCode, String)> {
    state
        .controller
        .set_command(&id, request.command)
        .map_err(registry_error)?;

    state
        .controller
        .snapshot(&id)
        .map(Json)
        .map_err(registry_error)
}

/// HTTP handler for PUT /api/targets/{id}/interval
pub(crate) async fn update_interval(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<IntervalRequest>,
) -> Result<Json<TargetSnapshot>, (StatusCode, String)> {
    let input = request.as_input();
    match state.controller.set_poll_interval(&id, &input) {
        Ok(seconds) => info!(target_id = %id, seconds, "Poll interval updated"),
        Err(e) => {
            warn!(target_id = %id, "Rejected poll interval: {}", e);
            return Err(registry_error(e));
        }
    }

    state
        .controller
        .snapshot(&id)
        .map(Json)
        .map_err(registry_error)
}
