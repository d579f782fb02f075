//! 종료 시그널 (Ctrl-C / SIGTERM) 처리

use std::future::Future;
use std::io;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 종료 시그널 수신 시 토큰 취소
pub async fn cancel_on_shutdown(cancel: CancellationToken) {
    shutdown_signal().await;
    info!("Shutdown now ...");
    cancel.cancel();
}

/// Ctrl-C 또는 SIGTERM 대기
pub async fn shutdown_signal() {
    tokio::select! {
        _ = wait_signal("Ctrl-C", tokio::signal::ctrl_c()) => {}
        _ = wait_signal("SIGTERM", terminate()) => {}
    }
}

/// 핸들러 설치에 실패한 시그널은 영원히 대기
async fn wait_signal<F>(name: &str, signal: F)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(e) = signal.await {
        warn!("Failed to listen for {}: {}", name, e);
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    term.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn terminate() -> io::Result<()> {
    std::future::pending().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_failed_handler_never_fires() {
        let failed = async { Err(io::Error::new(io::ErrorKind::Other, "no signal driver")) };
        let result = tokio::time::timeout(Duration::from_secs(3600), wait_signal("test", failed)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_received_signal_fires() {
        let received = async { Ok(()) };
        let result = tokio::time::timeout(Duration::from_secs(5), wait_signal("test", received)).await;
        assert!(result.is_ok());
    }
}
