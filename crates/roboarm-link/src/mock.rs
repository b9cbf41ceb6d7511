//! Mock 链路（测试用）
//!
//! `MockLink` 把每次调用记录到共享的 [`MockProbe`]，测试通过 probe
//! 检查调用序列、注入故障。链路本身移交给会话后，probe 仍可继续使用。

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use roboarm_protocol::{WireFrame, decode};

use crate::{DeviceHandle, DeviceLink, LinkError};

/// 链路调用记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCall {
    Scan,
    Connect(DeviceHandle),
    Disconnect,
    SendRaw(Vec<u8>),
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<LinkCall>,
    fail_scan: bool,
    fail_connect: bool,
    fail_disconnect: bool,
    fail_send: bool,
    /// 第 N 次（从 0 开始）send_raw 失败
    fail_send_at: Option<usize>,
    sends: usize,
    call_delay: Duration,
    timeout: Option<Duration>,
    next_address: u32,
}

/// Mock 链路的观察/控制端
#[derive(Debug, Clone, Default)]
pub struct MockProbe {
    state: Arc<Mutex<MockState>>,
}

impl MockProbe {
    /// 所有调用（按时间顺序）
    pub fn calls(&self) -> Vec<LinkCall> {
        self.state.lock().calls.clone()
    }

    /// 调用总数
    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// 已发送的原始字节
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                LinkCall::SendRaw(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    /// 已发送并成功解码的固件帧
    pub fn sent_frames(&self) -> Vec<WireFrame> {
        self.sent().iter().filter_map(|bytes| decode(bytes).ok()).collect()
    }

    /// 清空调用记录
    pub fn clear(&self) {
        self.state.lock().calls.clear();
    }

    pub fn fail_scan(&self, fail: bool) {
        self.state.lock().fail_scan = fail;
    }

    pub fn fail_connect(&self, fail: bool) {
        self.state.lock().fail_connect = fail;
    }

    pub fn fail_disconnect(&self, fail: bool) {
        self.state.lock().fail_disconnect = fail;
    }

    pub fn fail_send(&self, fail: bool) {
        self.state.lock().fail_send = fail;
    }

    /// 让之后第 `n` 次 send_raw 失败（从 0 计数）
    pub fn fail_send_at(&self, n: usize) {
        let mut state = self.state.lock();
        state.sends = 0;
        state.fail_send_at = Some(n);
    }

    /// 每次调用前阻塞的时长（用于并发测试）
    pub fn set_call_delay(&self, delay: Duration) {
        self.state.lock().call_delay = delay;
    }

    /// 会话设置的超时
    pub fn timeout(&self) -> Option<Duration> {
        self.state.lock().timeout
    }
}

/// Mock 链路
#[derive(Debug, Default)]
pub struct MockLink {
    probe: MockProbe,
}

impl MockLink {
    pub fn new() -> (Self, MockProbe) {
        let probe = MockProbe::default();
        (
            Self {
                probe: probe.clone(),
            },
            probe,
        )
    }

    /// 记录调用并按需阻塞（阻塞时不持有 probe 锁）
    fn record(&self, call: LinkCall) {
        let delay = {
            let mut state = self.probe.state.lock();
            state.calls.push(call);
            state.call_delay
        };
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
}

fn injected(message: &str) -> LinkError {
    LinkError::Backend(message.to_string())
}

impl DeviceLink for MockLink {
    fn scan(&mut self) -> Result<DeviceHandle, LinkError> {
        self.record(LinkCall::Scan);
        let mut state = self.probe.state.lock();
        if state.fail_scan {
            return Err(LinkError::NotFound);
        }
        state.next_address += 1;
        Ok(DeviceHandle::new(
            format!("mock-{}", state.next_address),
            "ESP32-RobotArm",
        ))
    }

    fn connect(&mut self, handle: &DeviceHandle) -> Result<(), LinkError> {
        self.record(LinkCall::Connect(handle.clone()));
        if self.probe.state.lock().fail_connect {
            return Err(injected("injected connect failure"));
        }
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), LinkError> {
        self.record(LinkCall::Disconnect);
        if self.probe.state.lock().fail_disconnect {
            return Err(injected("injected disconnect failure"));
        }
        Ok(())
    }

    fn send_raw(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        self.record(LinkCall::SendRaw(bytes.to_vec()));
        let mut state = self.probe.state.lock();
        let index = state.sends;
        state.sends += 1;
        if state.fail_send || state.fail_send_at == Some(index) {
            return Err(injected("injected send failure"));
        }
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.probe.state.lock().timeout = Some(timeout);
    }
}
