//! REST + WebSocket 适配层
//!
//! 两个适配器共用同一个 [`AppState`]，其中的 `Arc<DeviceSession>` 是进程内唯一的设备会话。

pub mod routes;
pub mod server;
pub mod stream;
pub mod types;
pub mod websocket;

pub use server::run_server;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use roboarm_session::DeviceSession;

use types::ApiError;

/// 路由共享状态
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<DeviceSession>,
    /// 当前打开的 WebSocket 连接数
    connections: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(session: Arc<DeviceSession>) -> Self {
        Self {
            session,
            connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn active_connections(&self) -> usize {
        self.connections.load(Ordering::Acquire)
    }

    /// 登记一个 WebSocket 连接，guard 析构时注销
    pub fn register_connection(&self) -> ConnectionGuard {
        let count = self.connections.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!("WebSocket connections: {}", count);
        ConnectionGuard {
            connections: Arc::clone(&self.connections),
        }
    }

    /// 在阻塞线程池上执行会话操作
    ///
    /// 会话方法会持锁调用链路，不能直接在 async 任务里执行。
    pub async fn with_session<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&DeviceSession) -> T + Send + 'static,
        T: Send + 'static,
    {
        let session = Arc::clone(&self.session);
        tokio::task::spawn_blocking(move || f(&session))
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))
    }
}

/// WebSocket 连接计数 guard
pub struct ConnectionGuard {
    connections: Arc<AtomicUsize>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let count = self.connections.fetch_sub(1, Ordering::AcqRel) - 1;
        tracing::debug!("WebSocket connections: {}", count);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use roboarm_link::mock::{MockLink, MockProbe};
    use roboarm_session::{BoxedLink, SessionConfig};

    /// 使用 MockLink 构造的状态
    pub fn mock_state() -> (AppState, MockProbe) {
        let (link, probe) = MockLink::new();
        let link: BoxedLink = Box::new(link);
        let session = Arc::new(DeviceSession::new(link, SessionConfig::default()));
        (AppState::new(session), probe)
    }

    /// 已连接的状态，调用记录已清空
    pub fn connected_state() -> (AppState, MockProbe) {
        let (state, probe) = mock_state();
        state.session.connect_discovered().unwrap();
        probe.clear();
        (state, probe)
    }
}
