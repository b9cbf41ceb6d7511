//! Axum 服务启动

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};

use super::AppState;
use super::routes::create_router;

/// 启动 HTTP 服务，直到收到关闭信号
pub async fn run_server(
    addr: SocketAddr,
    state: AppState,
    shutdown_rx: watch::Receiver<bool>,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("API server listening on http://{}", listener.local_addr()?);
    tracing::info!("WebSocket endpoint: ws://{}/ws", listener.local_addr()?);

    serve(listener, state, shutdown_rx).await
}

/// 在已绑定的 listener 上提供服务
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown_rx: watch::Receiver<bool>,
) -> Result<(), std::io::Error> {
    // Web 客户端可能从任意来源访问
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state).layer(cors);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_rx))
        .await
}

/// 等待关闭信号
///
/// 发送端被丢弃不算关闭信号，此时永远等待。
async fn shutdown_signal(mut shutdown_rx: watch::Receiver<bool>) {
    while !*shutdown_rx.borrow_and_update() {
        if shutdown_rx.changed().await.is_err() {
            tracing::warn!("Shutdown channel closed, server keeps running");
            std::future::pending::<()>().await;
        }
    }
    tracing::info!("API server shutting down gracefully");
}
