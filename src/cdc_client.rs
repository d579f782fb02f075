//! MaxScale CDC 클라이언트
//!
//! 한 세션의 흐름:
//! 1. 연결 (Dialer)
//! 2. 인증: hex("user:") + hex(SHA1(password)) → `OK`
//! 3. 등록: `REGISTER UUID=..., TYPE=...` → `OK`
//! 4. 요청: `REQUEST-DATA db.table[.version] [gtid]` (응답 대기 없음)
//! 5. 스트리밍: 줄 단위로 읽어 채널로 전달
//!
//! `ERR`로 시작하는 라인은 에러로, EOF는 정상 종료로 세션을 끝냅니다.
//! 어느 경우든 세션은 재사용되지 않습니다.
//!
//! 참고: <https://mariadb.com/resources/blog/how-to-stream-change-data-through-mariadb-maxscale-using-cdc-api/>

use crate::auth;
use crate::connection::{Connection, Dialer};
use crate::error::{CdcError, Result};
use crate::events::{Format, RawLine};
use crate::gtid::{self, Gtid};
use crate::protocol;
use crate::streamer::Reader;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// CDC 세션 설정
#[derive(Debug, Clone)]
pub struct CdcConfig {
    pub username: String,
    pub password: String,
    pub uuid: String,
    pub format: Format,
    pub database: String,
    pub table: String,
    /// 비어 있으면 최신 스키마 버전
    pub version: String,
}

/// MaxScale CDC 클라이언트
pub struct CdcClient<D> {
    dialer: D,
    config: CdcConfig,
}

impl<D: Dialer> CdcClient<D> {
    pub fn new(dialer: D, config: CdcConfig) -> Self {
        CdcClient { dialer, config }
    }

    pub fn config(&self) -> &CdcConfig {
        &self.config
    }

    /// 연결 후 핸드셰이크와 스트리밍 실행. 취소되면 에러 없이 반환
    async fn run_session(
        &self,
        cancel: &CancellationToken,
        gtid: Option<Gtid>,
        tx: mpsc::Sender<RawLine>,
    ) -> Result<()> {
        let mut conn = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            conn = self.dialer.dial() => conn?,
        };

        let result = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Session cancelled");
                Ok(())
            }
            result = self.handshake_and_stream(&mut conn, gtid, &tx) => result,
        };

        // 진행 중이던 read는 위 select에서 drop됨. 연결은 세션과 함께 닫음
        if let Err(e) = conn.shutdown().await {
            debug!("Failed to shutdown connection: {}", e);
        }
        result
    }

    async fn handshake_and_stream(
        &self,
        conn: &mut Box<dyn Connection>,
        gtid: Option<Gtid>,
        tx: &mpsc::Sender<RawLine>,
    ) -> Result<()> {
        self.authenticate(conn).await?;
        info!("Login successful as {}", self.config.username);

        self.register(conn).await?;
        info!(
            "Register with uuid: {} and type: {} successful",
            self.config.uuid, self.config.format
        );

        self.request_data(conn, gtid.as_ref()).await?;
        info!(
            "Start streaming of {}.{} (version: {:?}, gtid: {:?})",
            self.config.database,
            self.config.table,
            self.config.version,
            gtid::to_position_string(gtid.as_ref())
        );

        stream_lines(conn, tx).await
    }

    async fn authenticate(&self, conn: &mut Box<dyn Connection>) -> Result<()> {
        conn.write_all(auth::encode_user(&self.config.username).as_bytes())
            .await
            .map_err(|e| CdcError::IoError(format!("write auth user failed: {}", e)))?;
        conn.write_all(auth::encode_password(&self.config.password).as_bytes())
            .await
            .map_err(|e| CdcError::IoError(format!("write auth password failed: {}", e)))?;

        let response = protocol::read_response(conn).await?;
        if !protocol::is_ok_response(&response) {
            return Err(CdcError::AuthenticationFailed(protocol::response_text(
                &response,
            )));
        }
        Ok(())
    }

    async fn register(&self, conn: &mut Box<dyn Connection>) -> Result<()> {
        let command = protocol::register_command(&self.config.uuid, self.config.format);
        conn.write_all(command.as_bytes()).await.map_err(|e| {
            CdcError::IoError(format!(
                "register with uuid: {} and type: {} failed: {}",
                self.config.uuid, self.config.format, e
            ))
        })?;

        let response = protocol::read_response(conn).await?;
        if !protocol::is_ok_response(&response) {
            return Err(CdcError::RegistrationFailed(protocol::response_text(
                &response,
            )));
        }
        Ok(())
    }

    async fn request_data(&self, conn: &mut Box<dyn Connection>, gtid: Option<&Gtid>) -> Result<()> {
        let command = protocol::request_data_command(
            &self.config.database,
            &self.config.table,
            &self.config.version,
            gtid,
        );
        debug!("Sending {}", command);
        conn.write_all(command.as_bytes())
            .await
            .map_err(|e| CdcError::IoError(format!("write request failed: {}", e)))
    }
}

/// 연결이 닫힐 때까지 라인을 읽어 채널로 전달
async fn stream_lines(conn: &mut Box<dyn Connection>, tx: &mpsc::Sender<RawLine>) -> Result<()> {
    let mut reader = BufReader::new(conn);
    loop {
        let mut line = Vec::new();
        let n = reader
            .read_until(b'\n', &mut line)
            .await
            .map_err(|e| CdcError::IoError(format!("read line failed: {}", e)))?;

        // 줄바꿈 없이 끝난 조각은 완전한 이벤트가 아님
        if n == 0 || line.last() != Some(&b'\n') {
            info!("Connection closed");
            if !line.is_empty() {
                debug!("Dropped incomplete line of {} bytes", line.len());
            }
            return Ok(());
        }

        if protocol::is_error_line(&line) {
            return Err(CdcError::ProtocolError(format!(
                "got error: {}",
                protocol::response_text(&line)
            )));
        }

        debug!("Read {}", protocol::response_text(&line));
        tx.send(Bytes::from(line))
            .await
            .map_err(|_| CdcError::ChannelClosed)?;
    }
}

#[async_trait]
impl<D: Dialer> Reader for CdcClient<D> {
    async fn read(
        &self,
        cancel: &CancellationToken,
        gtid: Option<Gtid>,
        tx: mpsc::Sender<RawLine>,
    ) -> Result<()> {
        self.run_session(cancel, gtid, tx).await
    }
}
