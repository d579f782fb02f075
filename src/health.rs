//! 상태 확인 HTTP 엔드포인트
//!
//! - `/healthz`, `/readiness`: 200 OK
//! - `/metrics`: Prometheus 메트릭
//! - 그 외 경로: 404
//!
//! 취소 토큰이 취소되면 에러 없이 종료합니다.

use crate::error::{CdcError, Result};
use crate::metrics::Metrics;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 모든 인터페이스의 `port`에서 상태 확인 서버 실행
pub async fn run_health_server(
    port: u16,
    metrics: Arc<Metrics>,
    cancel: &CancellationToken,
) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| CdcError::IoError(format!("bind {} failed: {}", addr, e)))?;
    info!("Health check endpoint listening on http://{}", addr);

    serve(listener, metrics, cancel).await
}

/// 이미 bind된 listener로 요청 처리
pub async fn serve(
    listener: TcpListener,
    metrics: Arc<Metrics>,
    cancel: &CancellationToken,
) -> Result<()> {
    loop {
        let (socket, peer) = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Health check endpoint stopped");
                return Ok(());
            }
            accepted = listener.accept() => accepted
                .map_err(|e| CdcError::IoError(format!("accept failed: {}", e)))?,
        };

        let metrics = metrics.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_request(socket, &metrics).await {
                warn!("Health check request from {} failed: {}", peer, e);
            }
        });
    }
}

async fn handle_request(mut socket: TcpStream, metrics: &Metrics) -> io::Result<()> {
    let mut buf = [0u8; 1024];
    let n = socket.read(&mut buf).await?;
    if n == 0 {
        return Ok(());
    }

    // 요청 라인의 경로만 사용 (메서드 무관)
    let request = String::from_utf8_lossy(&buf[..n]);
    let target = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("");
    let path = target.split('?').next().unwrap_or(target);
    debug!("Health check request {}", path);

    socket.write_all(route(path, metrics).as_bytes()).await?;
    socket.shutdown().await
}

fn route(path: &str, metrics: &Metrics) -> String {
    match path {
        "/healthz" | "/readiness" => build_response(200, "OK", "text/plain", "OK"),
        "/metrics" => build_response(
            200,
            "OK",
            "text/plain; version=0.0.4; charset=utf-8",
            &metrics.render(),
        ),
        _ => build_response(404, "Not Found", "text/plain", "Not Found"),
    }
}

fn build_response(status: u16, reason: &str, content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        content_type,
        body.len(),
        body
    )
}
