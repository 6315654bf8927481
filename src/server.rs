// HTTP surface: JSON endpoints over the coordinator

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::coordinator::Coordinator;
use crate::messages::{
    AdminStateResponse, ClaimResponse, ClientId, ClientRequest, ErrorResponse,
    HeartbeatResponse, ManualDriveRequest, ManualDriveResponse, ReleaseResponse, RequestError,
    RunPathRequest, RunPathResponse, StatusResponse,
};

pub fn router(coordinator: Coordinator) -> Router {
    Router::new()
        .route("/api/claim", post(claim))
        .route("/api/release", post(release))
        .route("/api/status", post(status))
        .route("/api/heartbeat", post(heartbeat))
        .route("/api/manualdrive", post(manual_drive))
        .route("/api/runpath", post(run_path))
        .route("/api/admin/state", get(admin_state))
        .with_state(coordinator)
        .layer(TraceLayer::new_for_http())
}

/// Rejected input: 400 with `ok:false`
#[derive(Debug)]
pub struct ApiError(RequestError);

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(RequestError::Body(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        debug!("Rejected request: {}", self.0);
        (StatusCode::BAD_REQUEST, Json(ErrorResponse::from(&self.0))).into_response()
    }
}

type Body<T> = Result<Json<T>, JsonRejection>;

fn client_id(body: Body<ClientRequest>) -> Result<ClientId, ApiError> {
    let Json(req) = body?;
    Ok(ClientId::from_field(req.client_id)?)
}

async fn claim(
    State(coordinator): State<Coordinator>,
    body: Body<ClientRequest>,
) -> Result<Json<ClaimResponse>, ApiError> {
    let client = client_id(body)?;
    Ok(Json(coordinator.claim(&client)))
}

async fn release(
    State(coordinator): State<Coordinator>,
    body: Body<ClientRequest>,
) -> Result<Json<ReleaseResponse>, ApiError> {
    let client = client_id(body)?;
    Ok(Json(coordinator.release(&client)))
}

async fn status(
    State(coordinator): State<Coordinator>,
    body: Body<ClientRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let client = client_id(body)?;
    Ok(Json(coordinator.status(&client)))
}

async fn heartbeat(
    State(coordinator): State<Coordinator>,
    body: Body<ClientRequest>,
) -> Result<Json<HeartbeatResponse>, ApiError> {
    let client = client_id(body)?;
    Ok(Json(coordinator.heartbeat(&client)))
}

async fn manual_drive(
    State(coordinator): State<Coordinator>,
    body: Body<ManualDriveRequest>,
) -> Result<Json<ManualDriveResponse>, ApiError> {
    let Json(req) = body?;
    let client = ClientId::from_field(req.user_id.clone())?;
    let command = req.command()?;
    Ok(Json(coordinator.manual_drive(&client, command).await))
}

async fn run_path(
    State(coordinator): State<Coordinator>,
    body: Body<RunPathRequest>,
) -> Result<Json<RunPathResponse>, ApiError> {
    let Json(req) = body?;
    let client = ClientId::from_field(req.user_id)?;
    let resp = coordinator.run_path(&client, &req.segments).await?;
    Ok(Json(resp))
}

async fn admin_state(State(coordinator): State<Coordinator>) -> Json<AdminStateResponse> {
    Json(coordinator.admin_state())
}
