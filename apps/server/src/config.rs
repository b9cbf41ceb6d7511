//! 服务端配置
//!
//! 来源优先级：内置默认值 < TOML 配置文件 < 命令行参数。
//!
//! 配置文件位置：`--config` 显式指定，否则 `<config_dir>/roboarm/server.toml`（存在时才读取）。

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use roboarm_link::SimulatedConfig;
use roboarm_protocol::{DEFAULT_MOTOR_COUNT, DEVICE_NAME};
use roboarm_session::SessionConfig;
use serde::{Deserialize, Serialize};

/// 电机数量上限
pub const MAX_MOTOR_COUNT: u8 = 16;

/// 默认配置文件路径
pub fn default_config_file() -> Option<PathBuf> {
    let mut path = dirs::config_dir()?;
    path.push("roboarm");
    path.push("server.toml");
    Some(path)
}

/// 服务端配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// 监听地址
    pub bind: SocketAddr,

    /// 电机数量
    pub motor_count: u8,

    /// 链路操作超时（毫秒）
    pub link_timeout_ms: u64,

    /// 模拟链路
    pub link: LinkConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            motor_count: DEFAULT_MOTOR_COUNT,
            link_timeout_ms: 2000,
            link: LinkConfig::default(),
        }
    }
}

/// `[link]` 配置段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkConfig {
    pub device_name: String,
    pub address: String,
    pub latency_ms: u64,
    pub discoverable: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        let simulated = SimulatedConfig::default();
        Self {
            device_name: DEVICE_NAME.to_string(),
            address: simulated.address,
            latency_ms: 0,
            discoverable: true,
        }
    }
}

/// 命令行覆盖项（`None` 表示不覆盖）
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub bind: Option<SocketAddr>,
    pub motor_count: Option<u8>,
    pub link_timeout_ms: Option<u64>,
}

impl ServerConfig {
    /// 解析 TOML 文本
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse server config")
    }

    /// 从文件读取
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// 按优先级加载
    ///
    /// 显式指定的文件必须存在；默认位置的文件不存在时使用内置默认值。
    pub fn load(explicit: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match default_config_file() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(bind) = overrides.bind {
            self.bind = bind;
        }
        if let Some(count) = overrides.motor_count {
            self.motor_count = count;
        }
        if let Some(ms) = overrides.link_timeout_ms {
            self.link_timeout_ms = ms;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_MOTOR_COUNT).contains(&self.motor_count) {
            bail!(
                "motor_count must be in 1..={}, got {}",
                MAX_MOTOR_COUNT,
                self.motor_count
            );
        }
        if self.link_timeout_ms == 0 {
            bail!("link_timeout_ms must be greater than 0");
        }
        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            motor_count: self.motor_count,
            link_timeout: Duration::from_millis(self.link_timeout_ms),
        }
    }

    pub fn simulated_config(&self) -> SimulatedConfig {
        SimulatedConfig {
            device_name: self.link.device_name.clone(),
            address: self.link.address.clone(),
            latency: Duration::from_millis(self.link.latency_ms),
            discoverable: self.link.discoverable,
        }
    }
}
