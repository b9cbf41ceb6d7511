//! 模拟设备链路
//!
//! 在没有 BLE 硬件的环境中代替真实机械臂：扫描总是返回同一个设备，
//! 发送的字节按固件协议解码后写入日志。

use std::thread;
use std::time::Duration;

use roboarm_protocol::{DEVICE_NAME, decode, pwm_to_speed};
use tracing::{debug, info, warn};

use crate::{DeviceHandle, DeviceLink, LinkError};

/// 模拟设备配置
#[derive(Debug, Clone)]
pub struct SimulatedConfig {
    /// 广播名
    pub device_name: String,
    /// 设备地址
    pub address: String,
    /// 每次链路操作的模拟延迟
    pub latency: Duration,
    /// 是否可被扫描到（false 时 scan 返回 NotFound）
    pub discoverable: bool,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            device_name: DEVICE_NAME.to_string(),
            address: "24:6F:28:00:00:01".to_string(),
            latency: Duration::ZERO,
            discoverable: true,
        }
    }
}

/// 模拟设备链路
pub struct SimulatedLink {
    config: SimulatedConfig,
    timeout: Option<Duration>,
    connected: Option<DeviceHandle>,
}

impl SimulatedLink {
    pub fn new(config: SimulatedConfig) -> Self {
        Self {
            config,
            timeout: None,
            connected: None,
        }
    }

    /// 当前连接的设备
    pub fn connected_device(&self) -> Option<&DeviceHandle> {
        self.connected.as_ref()
    }

    /// 模拟链路延迟；延迟超过超时则返回 Timeout
    fn simulate_latency(&self) -> Result<(), LinkError> {
        if let Some(timeout) = self.timeout
            && self.config.latency > timeout
        {
            thread::sleep(timeout);
            return Err(LinkError::Timeout);
        }
        if !self.config.latency.is_zero() {
            thread::sleep(self.config.latency);
        }
        Ok(())
    }
}

impl Default for SimulatedLink {
    fn default() -> Self {
        Self::new(SimulatedConfig::default())
    }
}

impl DeviceLink for SimulatedLink {
    fn scan(&mut self) -> Result<DeviceHandle, LinkError> {
        info!("Scanning for {}...", self.config.device_name);
        self.simulate_latency()?;

        if !self.config.discoverable {
            return Err(LinkError::NotFound);
        }

        let handle = DeviceHandle::new(&self.config.address, &self.config.device_name);
        info!("Simulated device found: {}", handle);
        Ok(handle)
    }

    fn connect(&mut self, handle: &DeviceHandle) -> Result<(), LinkError> {
        self.simulate_latency()?;
        self.connected = Some(handle.clone());
        info!("Connected to simulated device {}", handle);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), LinkError> {
        self.simulate_latency()?;
        if let Some(handle) = self.connected.take() {
            info!("Disconnected from simulated device {}", handle);
        }
        Ok(())
    }

    fn send_raw(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        if self.connected.is_none() {
            return Err(LinkError::NotConnected);
        }
        self.simulate_latency()?;

        match decode(bytes) {
            Ok(frame) => debug!(
                "Simulated motor M{} -> {} pwm={} ({}%) duration={:?}",
                u16::from(frame.motor) + 1,
                frame.direction,
                frame.speed,
                pwm_to_speed(frame.speed),
                frame.duration
            ),
            // 固件对无法解析的 JSON 只打印日志并丢弃
            Err(e) => warn!("Simulated device dropped malformed payload: {}", e),
        }
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }
}
