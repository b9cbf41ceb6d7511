//! API 请求/响应类型

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use roboarm_session::SessionError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// 统一响应体
///
/// `status` 为 `"success"` 或 `"error"`，其余字段按需出现。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T = ()> {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: Some(message.into()),
            data: None,
            error: None,
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: None,
            data: None,
            error: Some(error.into()),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn with_data(data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: None,
            data: Some(data),
            error: None,
        }
    }
}

/// `GET /api/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerStatus {
    pub status: String,
    pub version: String,
    pub robot_connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl ServerStatus {
    pub fn running(robot_connected: bool) -> Self {
        Self {
            status: "running".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            robot_connected,
            timestamp: OffsetDateTime::now_utc().format(&Rfc3339).ok(),
        }
    }
}

/// `GET /api/robot-info` 的 `data`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotInfo {
    pub connected: bool,
    pub device_info: String,
}

/// HTTP 适配器错误
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Session(#[from] SessionError),

    /// 请求体无法绑定为指令
    #[error("{0}")]
    BadRequest(String),

    /// 阻塞任务 panic 或被取消
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Session(e) if e.is_validation() => StatusCode::BAD_REQUEST,
            ApiError::Session(e) if e.is_not_connected() => StatusCode::CONFLICT,
            ApiError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected ({}): {}", status, self);
        }
        (status, Json(ApiResponse::error(self.to_string()))).into_response()
    }
}
