//! # Robot Arm Link Layer
//!
//! 设备链路抽象层，提供统一的 scan / connect / disconnect / send 接口。
//!
//! 真实的物理链路（BLE 特征值写入等）由平台相关实现提供，本 crate 只定义契约：
//!
//! - [`DeviceLink`]: 链路能力 trait
//! - [`SimulatedLink`]: 无硬件时使用的模拟设备
//! - `mock::MockLink`（`mock` feature）: 记录调用并可注入故障，用于测试

use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub mod simulated;

#[cfg(feature = "mock")]
pub mod mock;

pub use simulated::{SimulatedConfig, SimulatedLink};

/// 链路层统一错误类型
#[derive(Error, Debug)]
pub enum LinkError {
    /// 后端（BLE 栈、驱动）报告的错误
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Operation timeout")]
    Timeout,
    /// 扫描结束仍未发现目标设备
    #[error("no matching device advertised")]
    NotFound,
    #[error("Link not connected")]
    NotConnected,
}

/// 扫描得到的设备句柄
///
/// 对会话层不透明：会话只保存、展示并在 connect 时交还给链路。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceHandle {
    address: String,
    name: String,
}

impl DeviceHandle {
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
        }
    }

    /// 设备地址（BLE MAC 等）
    pub fn address(&self) -> &str {
        &self.address
    }

    /// 设备广播名
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.address, self.name)
    }
}

/// 设备链路能力
///
/// 所有方法都是阻塞调用；实现方负责遵守 [`set_timeout`](DeviceLink::set_timeout)
/// 设置的超时，超时返回 [`LinkError::Timeout`]。
pub trait DeviceLink {
    fn scan(&mut self) -> Result<DeviceHandle, LinkError>;
    fn connect(&mut self, handle: &DeviceHandle) -> Result<(), LinkError>;
    fn disconnect(&mut self) -> Result<(), LinkError>;
    fn send_raw(&mut self, bytes: &[u8]) -> Result<(), LinkError>;
    fn set_timeout(&mut self, _timeout: Duration) {}
}

impl<L: DeviceLink + ?Sized> DeviceLink for Box<L> {
    fn scan(&mut self) -> Result<DeviceHandle, LinkError> {
        (**self).scan()
    }

    fn connect(&mut self, handle: &DeviceHandle) -> Result<(), LinkError> {
        (**self).connect(handle)
    }

    fn disconnect(&mut self) -> Result<(), LinkError> {
        (**self).disconnect()
    }

    fn send_raw(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        (**self).send_raw(bytes)
    }

    fn set_timeout(&mut self, timeout: Duration) {
        (**self).set_timeout(timeout)
    }
}
