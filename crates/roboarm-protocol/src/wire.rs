//! 固件线协议
//!
//! ESP32 固件通过 BLE 特征值接收紧凑 JSON：
//!
//! ```text
//! {"motor":0,"direction":"forward","speed":128,"duration":1500}
//! ```
//!
//! - `speed` 为 PWM 占空比（0-255），由百分比速度换算而来
//! - `duration` 可选，缺省表示持续转动
//! - 停止语义的指令统一编码为 `{"motor":i,"direction":"stop","speed":0}`

use serde::{Deserialize, Serialize};

use crate::{Direction, MAX_SPEED, MotorCommand, PWM_MAX, ProtocolError};

/// 固件帧（编码前/解码后的中间表示）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireFrame {
    pub motor: u8,
    pub direction: Direction,
    /// PWM 占空比（0-255）
    pub speed: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
}

impl From<&MotorCommand> for WireFrame {
    fn from(cmd: &MotorCommand) -> Self {
        let cmd = cmd.normalized();
        WireFrame {
            motor: cmd.motor_index(),
            direction: cmd.direction(),
            speed: speed_to_pwm(cmd.speed()),
            duration: cmd.duration_ms(),
        }
    }
}

/// 百分比速度 → PWM 占空比（四舍五入）
#[inline]
pub fn speed_to_pwm(percent: u8) -> u8 {
    let percent = u32::from(percent.min(MAX_SPEED));
    ((percent * u32::from(PWM_MAX) + u32::from(MAX_SPEED) / 2) / u32::from(MAX_SPEED)) as u8
}

/// PWM 占空比 → 百分比速度（四舍五入）
#[inline]
pub fn pwm_to_speed(pwm: u8) -> u8 {
    ((u32::from(pwm) * u32::from(MAX_SPEED) + u32::from(PWM_MAX) / 2) / u32::from(PWM_MAX)) as u8
}

/// 编码指令为固件 JSON 字节
pub fn encode(cmd: &MotorCommand) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(&WireFrame::from(cmd)).map_err(ProtocolError::Encode)
}

/// 解码固件 JSON 字节（用于模拟链路和测试）
pub fn decode(bytes: &[u8]) -> Result<WireFrame, ProtocolError> {
    serde_json::from_slice(bytes).map_err(ProtocolError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_to_pwm() {
        assert_eq!(speed_to_pwm(0), 0);
        assert_eq!(speed_to_pwm(50), 128);
        assert_eq!(speed_to_pwm(100), 255);
        // 超出范围的输入按 100 处理
        assert_eq!(speed_to_pwm(200), 255);
    }

    #[test]
    fn test_pwm_to_speed() {
        assert_eq!(pwm_to_speed(0), 0);
        assert_eq!(pwm_to_speed(128), 50);
        assert_eq!(pwm_to_speed(255), 100);
    }

    #[test]
    fn test_encode_move_command() {
        let cmd = MotorCommand::new(1, Direction::Forward, 100, Some(1500)).unwrap();
        let bytes = encode(&cmd).unwrap();
        assert_eq!(
            std::str::from_utf8(&bytes).unwrap(),
            r#"{"motor":1,"direction":"forward","speed":255,"duration":1500}"#
        );
    }

    #[test]
    fn test_encode_without_duration() {
        let cmd = MotorCommand::new(0, Direction::Backward, 50, None).unwrap();
        let bytes = encode(&cmd).unwrap();
        assert_eq!(
            std::str::from_utf8(&bytes).unwrap(),
            r#"{"motor":0,"direction":"backward","speed":128}"#
        );
    }

    #[test]
    fn test_stop_forms_encode_identically() {
        let zero_speed = MotorCommand::new(2, Direction::Backward, 0, Some(300)).unwrap();
        let explicit_stop = MotorCommand::stop(2);

        let a = encode(&zero_speed).unwrap();
        let b = encode(&explicit_stop).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            std::str::from_utf8(&a).unwrap(),
            r#"{"motor":2,"direction":"stop","speed":0}"#
        );
    }

    #[test]
    fn test_decode_frame() {
        let frame = decode(br#"{"motor":2,"direction":"stop","speed":0}"#).unwrap();
        assert_eq!(frame.motor, 2);
        assert_eq!(frame.direction, Direction::Stop);
        assert_eq!(frame.duration, None);

        assert!(decode(b"not json").is_err());
    }
}
