use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use fm_api_types::{
    ContractVersionResponse, FundRequest, FundersResponse, OperationResponse, RefreshResponse, SessionStateResponse,
};
use fm_session::{ContractView, FunderRecord, SessionController, SessionError};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

#[derive(Debug, Serialize)]
struct HealthResponse {
    service: &'static str,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct VersionResponse {
    service: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    kind: &'static str,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Clone)]
pub(crate) struct AppState {
    session: Arc<SessionController>,
}

pub(crate) fn router(session: Arc<SessionController>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/session", get(session_state))
        .route("/session/connect", post(session_connect))
        .route("/session/disconnect", post(session_disconnect))
        .route("/contract/refresh", post(contract_refresh))
        .route("/contract/fund", post(contract_fund))
        .route("/contract/withdraw", post(contract_withdraw))
        .route("/contract/funders", get(contract_funders))
        .route("/contract/version", get(contract_version))
        .layer(CorsLayer::permissive())
        .with_state(AppState { session })
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        service: "fundme-service",
        status: "ok",
    })
}

async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        service: "fundme-service",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn session_state(State(state): State<AppState>) -> Json<SessionStateResponse> {
    Json(state.session.snapshot().to_response())
}

async fn session_connect(State(state): State<AppState>) -> ApiResult<SessionStateResponse> {
    state.session.connect().await.map_err(session_error)?;
    Ok(Json(state.session.snapshot().to_response()))
}

async fn session_disconnect(State(state): State<AppState>) -> Json<SessionStateResponse> {
    state.session.disconnect().await;
    Json(state.session.snapshot().to_response())
}

async fn contract_refresh(State(state): State<AppState>) -> Json<RefreshResponse> {
    let refreshed = state.session.refresh_contract_view().await;
    let contract = state
        .session
        .snapshot()
        .contract_view
        .as_ref()
        .map(ContractView::to_response);
    Json(RefreshResponse { refreshed, contract })
}

async fn contract_fund(
    State(state): State<AppState>,
    Json(request): Json<FundRequest>,
) -> ApiResult<OperationResponse> {
    let operation = state
        .session
        .fund(&request.amount)
        .await
        .map_err(session_error)?;
    Ok(Json(OperationResponse { operation }))
}

async fn contract_withdraw(State(state): State<AppState>) -> ApiResult<OperationResponse> {
    let operation = state.session.withdraw().await.map_err(session_error)?;
    Ok(Json(OperationResponse { operation }))
}

async fn contract_funders(State(state): State<AppState>) -> ApiResult<FundersResponse> {
    let funders = state.session.funders().await.map_err(session_error)?;
    Ok(Json(FundersResponse {
        funders: funders.iter().map(FunderRecord::to_entry).collect(),
    }))
}

async fn contract_version(State(state): State<AppState>) -> ApiResult<ContractVersionResponse> {
    let version = state
        .session
        .contract_version()
        .await
        .map_err(session_error)?;
    Ok(Json(ContractVersionResponse {
        version: version.to_string(),
    }))
}

fn session_error(err: SessionError) -> ApiError {
    let status = match &err {
        SessionError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
        SessionError::AuthorizationRejected(_) | SessionError::TransactionRejected(_) | SessionError::NotOwner => {
            StatusCode::FORBIDDEN
        }
        SessionError::NotConnected | SessionError::Busy => StatusCode::CONFLICT,
        SessionError::InsufficientWalletBalance(_) | SessionError::ExecutionReverted(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        SessionError::WalletUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        SessionError::ReadFailure(_) | SessionError::Provider(_) => StatusCode::BAD_GATEWAY,
        SessionError::ConfirmationTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            kind: err.kind(),
        }),
    )
}
