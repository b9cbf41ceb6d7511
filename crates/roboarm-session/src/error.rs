//! 会话层错误类型定义

use roboarm_link::LinkError;
use roboarm_protocol::{ProtocolError, ValidationError};
use thiserror::Error;

/// 会话层错误类型
#[derive(Error, Debug)]
pub enum SessionError {
    /// 指令校验失败（未触达链路）
    #[error("Invalid command: {0}")]
    Validation(#[from] ValidationError),

    /// 未连接设备
    #[error("Not connected to device")]
    NotConnected,

    /// 扫描未找到设备
    #[error("Device not found: {0}")]
    NotFound(#[source] LinkError),

    /// 链路连接失败
    #[error("Connection failed: {0}")]
    Connection(#[source] LinkError),

    /// 链路断开失败（会话状态仍然变为 Disconnected）
    #[error("Disconnect failed: {0}")]
    Disconnect(#[source] LinkError),

    /// 发送失败或链路超时
    #[error("Transport error: {0}")]
    Transport(#[source] LinkError),

    /// 指令编码失败
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 全部急停时某个电机失败（后续电机未尝试）
    #[error("Failed to stop motor {motor}: {source}")]
    StopMotor {
        motor: u8,
        #[source]
        source: Box<SessionError>,
    },
}

impl SessionError {
    /// 去掉 `StopMotor` 包装后的根错误
    pub fn root(&self) -> &SessionError {
        match self {
            SessionError::StopMotor { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_not_connected(&self) -> bool {
        matches!(self.root(), SessionError::NotConnected)
    }

    pub fn is_validation(&self) -> bool {
        matches!(self.root(), SessionError::Validation(_))
    }
}
