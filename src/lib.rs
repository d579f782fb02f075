//! MariaDB MaxScale CDC → Kafka 커넥터
//!
//! MaxScale CDC 프로토콜로 테이블의 변경 이벤트를 읽어 Kafka 토픽으로 전송합니다.
//! 주요 기능:
//! - MaxScale CDC 프로토콜 (인증, 등록, 스트리밍)
//! - GTID 체크포인트 저장 및 복원
//! - 연결 실패 시 마지막 GTID부터 재시작
//! - 전송 확인 후 체크포인트 (at-least-once)
//! - 상태 확인 / Prometheus 메트릭 HTTP 엔드포인트

pub mod app;
pub mod auth;
pub mod cdc_client;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod gtid;
pub mod health;
pub mod metrics;
pub mod offset;
pub mod producer;
pub mod protocol;
pub mod retry_reader;
pub mod shutdown;
pub mod streamer;

pub use app::App;
pub use cdc_client::{CdcClient, CdcConfig};
pub use config::AppConfig;
pub use connection::{Connection, ConnectionConfig, Dialer, TcpDialer};
pub use error::{CdcError, Result};
pub use events::{Format, FormatGtidExtractor, GtidExtractor, RawLine};
pub use gtid::Gtid;
pub use metrics::Metrics;
pub use offset::{FileGtidStore, GtidStore};
pub use producer::{KafkaSender, KeyMode};
pub use retry_reader::ResumingReader;
pub use streamer::{Reader, Sender, Streamer};
