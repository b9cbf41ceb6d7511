//! 会话状态与快照

use std::time::Duration;

use roboarm_link::DeviceHandle;
use roboarm_protocol::DEFAULT_MOTOR_COUNT;

/// 未连接时 `device_info()` 的返回值
pub const NO_DEVICE_INFO: &str = "no device connected";

/// 会话连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connected,
}

/// 会话配置
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// 电机数量（全部急停的范围，也是合法电机索引的上界）
    pub motor_count: u8,
    /// 链路操作超时（scan / connect / send）
    pub link_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            motor_count: DEFAULT_MOTOR_COUNT,
            link_timeout: Duration::from_secs(2),
        }
    }
}

/// 会话快照
///
/// 每次变更操作结束时在锁内发布，观察者通过 `ArcSwap::load` 无锁读取。
/// `state` 与 `device` 来自同一个句柄槽位，因此
/// `state == Connected` 当且仅当 `device.is_some()`。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub device: Option<DeviceHandle>,
    /// 成功发送的指令数
    pub commands_sent: u64,
    /// 发送失败的指令数
    pub commands_failed: u64,
}

impl SessionSnapshot {
    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// 设备描述（`Device: <address> (<name>)`）
    pub fn device_info(&self) -> String {
        match &self.device {
            Some(handle) => format!("Device: {}", handle),
            None => NO_DEVICE_INFO.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_snapshot() {
        let snapshot = SessionSnapshot::default();
        assert!(!snapshot.is_connected());
        assert_eq!(snapshot.device_info(), NO_DEVICE_INFO);
    }

    #[test]
    fn test_device_info_connected() {
        let snapshot = SessionSnapshot {
            state: SessionState::Connected,
            device: Some(DeviceHandle::new("AA:BB", "ESP32-RobotArm")),
            ..SessionSnapshot::default()
        };
        assert_eq!(snapshot.device_info(), "Device: AA:BB (ESP32-RobotArm)");
    }
}
