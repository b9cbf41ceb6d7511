//! 会话层模块
//!
//! 本模块提供机械臂的设备会话，包括：
//! - 单设备连接状态管理（Disconnected / Connected）
//! - 变更操作串行化（单把互斥锁）
//! - 无锁状态快照（ArcSwap）
//! - 全部急停（fail-fast）
//!
//! # 使用场景
//!
//! 服务端在启动时创建一个 `Arc<DeviceSession>`，分别交给 REST 和 WebSocket 适配器。

mod error;
mod session;
mod state;

pub use error::SessionError;
pub use session::{BoxedLink, DeviceSession};
pub use state::{NO_DEVICE_INFO, SessionConfig, SessionSnapshot, SessionState};

// 重新导出下层常用类型
pub use roboarm_link::{DeviceHandle, DeviceLink, LinkError};
pub use roboarm_protocol::{Direction, MotorCommand, ValidationError};
