//! 设备会话
//!
//! 进程内唯一的 `DeviceSession` 持有设备链路和设备句柄。
//! REST 请求和所有 WebSocket 连接共用同一个 `Arc<DeviceSession>`。
//!
//! # 并发模型
//!
//! - 变更操作（connect / disconnect / send / stop-all / scan）在同一把
//!   `parking_lot::Mutex` 下执行，链路调用也在锁内，同一时刻只有一个操作在途
//! - 每个变更操作结束前在锁内发布 [`SessionSnapshot`]
//! - 只读观察者（`is_connected` / `device_info` / `snapshot`）走 `ArcSwap::load`，不抢锁

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use roboarm_link::{DeviceHandle, DeviceLink};
use roboarm_protocol::{MotorCommand, encode};
use tracing::{debug, info, trace, warn};

use crate::error::SessionError;
use crate::state::{SessionConfig, SessionSnapshot, SessionState};

/// 服务端默认使用的链路类型（trait object）
pub type BoxedLink = Box<dyn DeviceLink + Send>;

/// 锁保护的可变状态
struct Inner<L> {
    link: L,
    /// 设备句柄；`Some` 即 Connected
    handle: Option<DeviceHandle>,
    commands_sent: u64,
    commands_failed: u64,
}

impl<L: DeviceLink> Inner<L> {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: if self.handle.is_some() {
                SessionState::Connected
            } else {
                SessionState::Disconnected
            },
            device: self.handle.clone(),
            commands_sent: self.commands_sent,
            commands_failed: self.commands_failed,
        }
    }

    fn connect(&mut self, handle: DeviceHandle) -> Result<(), SessionError> {
        if let Some(current) = &self.handle {
            // 已连接时直接替换句柄，不先断开旧连接
            warn!("Already connected to {}, replacing with {}", current, handle);
        }

        self.link
            .connect(&handle)
            .map_err(SessionError::Connection)?;

        info!("Connected to {}", handle);
        self.handle = Some(handle);
        Ok(())
    }

    fn send(&mut self, cmd: &MotorCommand, motor_count: u8) -> Result<(), SessionError> {
        if self.handle.is_none() {
            return Err(SessionError::NotConnected);
        }
        cmd.ensure_motor_index(motor_count)?;
        self.send_frame(cmd)
    }

    /// 编码并写入链路（调用方已检查连接状态）
    fn send_frame(&mut self, cmd: &MotorCommand) -> Result<(), SessionError> {
        let bytes = encode(cmd)?;
        trace!("Sending {} bytes: {:?}", bytes.len(), String::from_utf8_lossy(&bytes));

        match self.link.send_raw(&bytes) {
            Ok(()) => {
                self.commands_sent += 1;
                debug!("Command sent: {}", cmd);
                Ok(())
            },
            Err(e) => {
                self.commands_failed += 1;
                warn!("Failed to send command {}: {}", cmd, e);
                Err(SessionError::Transport(e))
            },
        }
    }
}

/// 设备会话（单设备，串行化访问）
pub struct DeviceSession<L = BoxedLink> {
    inner: Mutex<Inner<L>>,
    snapshot: ArcSwap<SessionSnapshot>,
    config: SessionConfig,
}

impl<L: DeviceLink> DeviceSession<L> {
    /// 创建会话（初始为 Disconnected）
    ///
    /// 链路超时在此处一次性下发给链路。
    pub fn new(mut link: L, config: SessionConfig) -> Self {
        link.set_timeout(config.link_timeout);
        Self {
            inner: Mutex::new(Inner {
                link,
                handle: None,
                commands_sent: 0,
                commands_failed: 0,
            }),
            snapshot: ArcSwap::from_pointee(SessionSnapshot::default()),
            config,
        }
    }

    /// 在锁内发布快照
    fn publish(&self, inner: &Inner<L>) {
        self.snapshot.store(Arc::new(inner.snapshot()));
    }

    /// 扫描设备
    ///
    /// 每次调用都会重新扫描，不缓存结果。
    pub fn scan_for_device(&self) -> Result<DeviceHandle, SessionError> {
        let mut inner = self.inner.lock();
        inner
            .link
            .scan()
            .map_err(SessionError::NotFound)
    }

    /// 连接到指定设备
    ///
    /// 已连接时替换句柄（不会先断开），失败时状态保持不变。
    pub fn connect(&self, handle: DeviceHandle) -> Result<(), SessionError> {
        let mut inner = self.inner.lock();
        let result = inner.connect(handle);
        self.publish(&inner);
        result
    }

    /// 扫描并连接（同一次加锁内完成）
    pub fn connect_discovered(&self) -> Result<DeviceHandle, SessionError> {
        let mut inner = self.inner.lock();
        let handle = inner
            .link
            .scan()
            .map_err(SessionError::NotFound)?;
        let result = inner.connect(handle.clone());
        self.publish(&inner);
        result.map(|()| handle)
    }

    /// 断开连接
    ///
    /// 未连接时直接返回 `Ok`，不调用链路。
    /// 已连接时无论链路是否报错，结束后状态都是 Disconnected；链路错误仍会返回。
    pub fn disconnect(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.lock();
        let Some(handle) = inner.handle.take() else {
            debug!("Disconnect requested while already disconnected");
            return Ok(());
        };

        let result = inner.link.disconnect();
        self.publish(&inner);

        match result {
            Ok(()) => {
                info!("Disconnected from {}", handle);
                Ok(())
            },
            Err(e) => {
                warn!("Link error while disconnecting from {}: {}", handle, e);
                Err(SessionError::Disconnect(e))
            },
        }
    }

    /// 发送电机指令
    ///
    /// 未连接时立即返回 `NotConnected`，不会调用链路。
    pub fn send_command(&self, cmd: &MotorCommand) -> Result<(), SessionError> {
        let mut inner = self.inner.lock();
        let result = inner.send(cmd, self.config.motor_count);
        self.publish(&inner);
        result
    }

    /// 依次停止 `0..motor_count` 号电机
    ///
    /// 整个过程持有同一把锁。遇到第一个失败立即返回（附带失败的电机索引），
    /// 剩余电机不再尝试。`motor_count` 由调用方决定，不受配置中电机数量的限制。
    pub fn stop_all_motors(&self, motor_count: u8) -> Result<(), SessionError> {
        let mut inner = self.inner.lock();
        if inner.handle.is_none() {
            return Err(SessionError::NotConnected);
        }

        info!("Stopping all motors ({})", motor_count);
        let mut result = Ok(());
        for motor in 0..motor_count {
            if let Err(e) = inner.send_frame(&MotorCommand::stop(motor)) {
                result = Err(SessionError::StopMotor {
                    motor,
                    source: Box::new(e),
                });
                break;
            }
        }

        self.publish(&inner);
        result
    }

    /// 使用配置中的电机数量执行全部急停
    pub fn stop_all(&self) -> Result<(), SessionError> {
        self.stop_all_motors(self.config.motor_count)
    }

    pub fn state(&self) -> SessionState {
        self.snapshot.load().state
    }

    pub fn is_connected(&self) -> bool {
        self.snapshot.load().is_connected()
    }

    pub fn device_info(&self) -> String {
        self.snapshot.load().device_info()
    }

    /// 最近一次发布的快照
    pub fn snapshot(&self) -> Arc<SessionSnapshot> {
        self.snapshot.load_full()
    }
}
