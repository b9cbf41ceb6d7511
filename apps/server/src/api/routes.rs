//! REST 路由
//!
//! 每个请求对应一次会话调用和一个响应；会话错误通过 [`ApiError`] 映射为状态码。

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::{get, post};
use axum::{Json, Router};
use roboarm_session::MotorCommand;

use super::AppState;
use super::types::{ApiError, ApiResponse, RobotInfo, ServerStatus};
use super::websocket::ws_handler;

/// 创建路由
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(status_handler))
        .route("/api/connect", post(connect_handler))
        .route("/api/disconnect", post(disconnect_handler))
        .route("/api/motor", post(motor_handler))
        .route("/api/stop-all", post(stop_all_handler))
        .route("/api/robot-info", get(robot_info_handler))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn status_handler(State(state): State<AppState>) -> Json<ServerStatus> {
    Json(ServerStatus::running(state.session.is_connected()))
}

async fn connect_handler(State(state): State<AppState>) -> Result<Json<ApiResponse>, ApiError> {
    state.with_session(|s| s.connect_discovered()).await??;
    Ok(Json(ApiResponse::success("Connected to robot")))
}

async fn disconnect_handler(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse>, ApiError> {
    state.with_session(|s| s.disconnect()).await??;
    Ok(Json(ApiResponse::success("Disconnected from robot")))
}

async fn motor_handler(
    State(state): State<AppState>,
    payload: Result<Json<MotorCommand>, JsonRejection>,
) -> Result<Json<ApiResponse>, ApiError> {
    let Json(cmd) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    tracing::debug!("REST motor command: {}", cmd);

    state.with_session(move |s| s.send_command(&cmd)).await??;
    Ok(Json(ApiResponse::success("Motor command sent")))
}

async fn stop_all_handler(State(state): State<AppState>) -> Result<Json<ApiResponse>, ApiError> {
    state.with_session(|s| s.stop_all()).await??;
    Ok(Json(ApiResponse::success("All motors stopped")))
}

async fn robot_info_handler(State(state): State<AppState>) -> Json<ApiResponse<RobotInfo>> {
    // 连接状态与设备描述来自同一个快照
    let snapshot = state.session.snapshot();
    Json(ApiResponse::with_data(RobotInfo {
        connected: snapshot.is_connected(),
        device_info: snapshot.device_info(),
    }))
}
