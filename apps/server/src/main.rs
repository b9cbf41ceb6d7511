//! # Robot Arm Server
//!
//! ESP32 机械臂控制桥：REST + WebSocket 接口，背后是单一的设备会话。
//!
//! ```bash
//! # 默认监听 0.0.0.0:8000
//! roboarm-server
//!
//! # 指定配置文件并覆盖监听地址
//! roboarm-server --config ./server.toml --bind 127.0.0.1:9000
//! ```
//!
//! ## 接口
//!
//! - `GET  /api/status`、`GET /api/robot-info`
//! - `POST /api/connect`、`/api/disconnect`、`/api/motor`、`/api/stop-all`
//! - `GET  /ws`（WebSocket）

mod api;
mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use roboarm_link::SimulatedLink;
use roboarm_session::{BoxedLink, DeviceSession};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

use api::AppState;
use config::{Overrides, ServerConfig};

/// 机械臂控制服务
#[derive(Parser, Debug)]
#[command(name = "roboarm-server")]
#[command(about = "REST + WebSocket control bridge for the ESP32 robot arm", long_about = None)]
#[command(version)]
struct Args {
    /// 配置文件路径
    ///
    /// 默认: <config_dir>/roboarm/server.toml（存在时）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 监听地址（覆盖配置文件）
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// 电机数量（覆盖配置文件）
    #[arg(long)]
    motor_count: Option<u8>,

    /// 链路操作超时（毫秒，覆盖配置文件）
    #[arg(long)]
    link_timeout_ms: Option<u64>,

    /// 日志级别过滤（如 debug、roboarm_session=trace）
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            bind: self.bind,
            motor_count: self.motor_count,
            link_timeout_ms: self.link_timeout_ms,
        }
    }
}

fn init_tracing(log_level: Option<&str>) -> Result<()> {
    let directive = log_level.unwrap_or("roboarm_server=info");
    let directive: Directive = directive
        .parse()
        .with_context(|| format!("Invalid log directive: {}", directive))?;
    let filter = EnvFilter::from_default_env().add_directive(directive);

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_level.as_deref())?;

    let config = ServerConfig::load(args.config.as_deref(), &args.overrides())?;
    tracing::debug!("Server config: {:?}", config);

    let link: BoxedLink = Box::new(SimulatedLink::new(config.simulated_config()));
    let session = Arc::new(DeviceSession::new(link, config.session_config()));
    let state = AppState::new(Arc::clone(&session));

    // Ctrl+C 优雅退出
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            // 保持发送端存活，服务继续运行
            std::future::pending::<()>().await;
        }
        tracing::info!("Received interrupt signal, shutting down");
        let _ = shutdown_tx.send(true);
    });

    tracing::info!("Starting robot arm server ({} motors)", config.motor_count);
    api::run_server(config.bind, state, shutdown_rx)
        .await
        .with_context(|| format!("API server on {} failed", config.bind))?;

    // 退出前停止所有电机并断开设备
    tokio::task::spawn_blocking(move || {
        if session.is_connected() {
            if let Err(e) = session.stop_all() {
                tracing::warn!("Failed to stop motors on shutdown: {}", e);
            }
            if let Err(e) = session.disconnect() {
                tracing::warn!("Failed to disconnect on shutdown: {}", e);
            }
        }
    })
    .await
    .context("Shutdown task failed")?;

    tracing::info!("Server stopped");
    Ok(())
}
