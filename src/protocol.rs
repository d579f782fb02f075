//! MaxScale CDC 프로토콜 명령 및 응답 처리
//!
//! 명령은 줄바꿈 없는 평문으로 전송합니다.
//! - `REGISTER UUID=<uuid>, TYPE=<JSON|AVRO>`
//! - `REQUEST-DATA DATABASE.TABLE[.VERSION] [GTID]`
//!
//! 핸드셰이크 응답은 한 번의 read로 받은 청크가 `OK`로 시작하면 성공입니다.

use crate::error::{CdcError, Result};
use crate::events::Format;
use crate::gtid::Gtid;
use tokio::io::{AsyncRead, AsyncReadExt};

/// 핸드셰이크 응답 버퍼 크기
pub const RESPONSE_BUFFER_SIZE: usize = 1024;

const OK: &[u8] = b"OK";
const ERR: &[u8] = b"ERR";

/// REGISTER 명령 생성
pub fn register_command(uuid: &str, format: Format) -> String {
    format!("REGISTER UUID={}, TYPE={}", uuid, format)
}

/// REQUEST-DATA 명령 생성. version이 비어 있으면 생략, GTID가 없으면 생략
pub fn request_data_command(
    database: &str,
    table: &str,
    version: &str,
    gtid: Option<&Gtid>,
) -> String {
    let mut command = format!("REQUEST-DATA {}.{}", database, table);
    if !version.is_empty() {
        command.push('.');
        command.push_str(version);
    }
    if let Some(gtid) = gtid {
        command.push(' ');
        command.push_str(&gtid.to_string());
    }
    command
}

/// 응답 청크 한 번 읽기
pub async fn read_response<R: AsyncRead + Unpin + ?Sized>(reader: &mut R) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; RESPONSE_BUFFER_SIZE];
    let n = reader
        .read(&mut buf)
        .await
        .map_err(|e| CdcError::IoError(format!("read failed: {}", e)))?;
    if n == 0 {
        return Err(CdcError::IoError(
            "connection closed while waiting for response".to_string(),
        ));
    }
    buf.truncate(n);
    Ok(buf)
}

pub fn starts_with(line: &[u8], prefix: &[u8]) -> bool {
    line.len() >= prefix.len() && &line[..prefix.len()] == prefix
}

/// OK 응답 확인
pub fn is_ok_response(data: &[u8]) -> bool {
    starts_with(data, OK)
}

/// 에러 라인 확인
pub fn is_error_line(data: &[u8]) -> bool {
    starts_with(data, ERR)
}

/// 로그/에러 메시지용 텍스트
pub fn response_text(data: &[u8]) -> String {
    String::from_utf8_lossy(data).trim_end().to_string()
}
