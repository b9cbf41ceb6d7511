//! # Robot Arm Protocol
//!
//! 机械臂电机指令模型（无硬件依赖）
//!
//! ## 模块
//!
//! - `command`: 规范化的电机指令 `MotorCommand` 及输入校验
//! - `wire`: 发往 ESP32 固件的 JSON 字节编码
//!
//! ## 分层
//!
//! ```text
//! Transport (REST / WebSocket)
//!     ↓ MotorCommand::validate() / serde 绑定
//! MotorCommand (此 crate)
//!     ↓ wire::encode()
//! Device Link (roboarm-link)
//! ```
//!
//! 校验失败的输入在此层被拒绝，不会到达会话层或设备链路。

pub mod command;
pub mod wire;

pub use command::{Direction, MotorCommand};
pub use wire::{WireFrame, decode, encode, pwm_to_speed, speed_to_pwm};

use thiserror::Error;

/// 最大速度（百分比）
pub const MAX_SPEED: u8 = 100;

/// 固件 PWM 占空比上限（`ledcWrite` 8 位分辨率）
pub const PWM_MAX: u8 = 255;

/// 机械臂电机数量（M1 小臂、M2 大臂、M3 夹爪）
pub const DEFAULT_MOTOR_COUNT: u8 = 3;

/// 固件广播的 BLE 设备名
pub const DEVICE_NAME: &str = "ESP32-RobotArm";

/// 输入校验错误
///
/// 每个变体都指明出错字段，调用方可以直接把消息返回给客户端。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing field `{field}`")]
    Missing { field: &'static str },

    #[error("field `{field}` must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("field `{field}` out of range: {value}")]
    OutOfRange { field: &'static str, value: i128 },

    #[error("speed {0} out of range [0, 100]")]
    SpeedOutOfRange(i128),

    #[error("unknown direction '{0}' (expected forward, backward or stop)")]
    UnknownDirection(String),

    #[error("motor index {index} out of range (motor count: {count})")]
    MotorOutOfRange { index: u8, count: u8 },
}

/// 线协议编解码错误
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Encode error: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Decode error: {0}")]
    Decode(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::Missing { field: "motor" };
        assert_eq!(err.to_string(), "missing field `motor`");

        let err = ValidationError::WrongType {
            field: "speed",
            expected: "an integer",
        };
        assert_eq!(err.to_string(), "field `speed` must be an integer");

        let err = ValidationError::SpeedOutOfRange(101);
        assert_eq!(err.to_string(), "speed 101 out of range [0, 100]");

        let err = ValidationError::UnknownDirection("Forward".to_string());
        assert!(err.to_string().contains("'Forward'"));

        let err = ValidationError::MotorOutOfRange { index: 5, count: 3 };
        assert!(err.to_string().contains("motor index 5"));
    }
}
