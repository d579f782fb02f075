//! CDC 관련 에러 타입

use thiserror::Error;
use std::io;

#[derive(Error, Debug)]
pub enum CdcError {
    #[error("CDC 연결 에러: {0}")]
    ConnectionError(String),

    #[error("인증 실패: {0}")]
    AuthenticationFailed(String),

    #[error("등록 실패: {0}")]
    RegistrationFailed(String),

    #[error("프로토콜 에러: {0}")]
    ProtocolError(String),

    #[error("I/O 에러: {0}")]
    IoError(String),

    #[error("GTID 처리 에러: {0}")]
    GtidError(String),

    #[error("Kafka 전송 에러: {0}")]
    PublishError(String),

    #[error("체크포인트 저장 에러: {0}")]
    CheckpointError(String),

    #[error("직렬화 에러: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("설정 에러: {0}")]
    ConfigError(String),

    #[error("채널이 닫혔습니다")]
    ChannelClosed,
}

impl From<io::Error> for CdcError {
    fn from(err: io::Error) -> Self {
        CdcError::IoError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CdcError>;
