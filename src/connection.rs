//! MaxScale CDC 서버 연결 관리

use crate::error::{CdcError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

/// 양방향 바이트 스트림
pub trait Connection: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Connection for T {}

/// 새 연결을 여는 역할
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self) -> Result<Box<dyn Connection>>;
}

/// CDC 서버 연결 설정
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub hostname: String,
    pub port: u16,
    pub timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            hostname: "localhost".to_string(),
            port: 4001,
            timeout: Duration::from_secs(30),
        }
    }
}

impl ConnectionConfig {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        ConnectionConfig {
            hostname: hostname.into(),
            port,
            ..Default::default()
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}

/// TCP 연결
#[derive(Debug, Clone)]
pub struct TcpDialer {
    config: ConnectionConfig,
}

impl TcpDialer {
    pub fn new(config: ConnectionConfig) -> Self {
        TcpDialer { config }
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self) -> Result<Box<dyn Connection>> {
        let addr = self.config.address();
        debug!("Connecting to {}", addr);

        let stream = tokio::time::timeout(self.config.timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| {
                CdcError::ConnectionError(format!(
                    "connect to {} timed out after {:?}",
                    addr, self.config.timeout
                ))
            })?
            .map_err(|e| CdcError::ConnectionError(format!("connect to {} failed: {}", addr, e)))?;

        Ok(Box::new(stream))
    }
}
