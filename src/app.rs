//! MariaDB(MaxScale CDC) → Kafka 스트리밍 애플리케이션
//!
//! TcpDialer → CdcClient → ResumingReader → Streamer → KafkaSender
//!
//! 상태 확인 HTTP 서버가 스트리머와 함께 실행되며, 둘 중 하나라도 끝나면
//! 나머지도 취소됩니다.

use crate::cdc_client::CdcClient;
use crate::config::AppConfig;
use crate::connection::TcpDialer;
use crate::error::Result;
use crate::events::FormatGtidExtractor;
use crate::gtid::{self, Gtid};
use crate::health;
use crate::metrics::Metrics;
use crate::offset::{FileGtidStore, GtidStore};
use crate::producer::{KafkaProducerFactory, KafkaSender};
use crate::retry_reader::ResumingReader;
use crate::streamer::Streamer;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct App {
    config: AppConfig,
}

impl App {
    /// 설정 검증 후 생성
    pub fn new(config: AppConfig) -> Result<Self> {
        config.validate()?;
        Ok(App { config })
    }

    /// 취소되거나 전송 쪽 또는 상태 확인 서버가 실패할 때까지 실행
    pub async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        let store = FileGtidStore::new(self.config.data_dir.clone());
        let gtid = load_checkpoint(&store).await;
        info!(
            "Starting from gtid {:?}",
            gtid::to_position_string(gtid.as_ref())
        );

        let metrics = Arc::new(Metrics::new());
        let extractor = FormatGtidExtractor::new(self.config.cdc_format);
        let reader = ResumingReader::new(
            CdcClient::new(
                TcpDialer::new(self.config.connection_config()),
                self.config.cdc_config(),
            ),
            extractor,
        )
        .with_backoff(self.config.retry_backoff)
        .with_metrics(metrics.clone());
        let sender = KafkaSender::new(
            KafkaProducerFactory::new(self.config.kafka_config()),
            store,
            extractor,
        )
        .with_key_mode(self.config.kafka_key)
        .with_metrics(metrics.clone());
        let streamer = Streamer::new(reader, sender)
            .with_gtid(gtid)
            .with_capacity(self.config.channel_capacity);

        let cancel = cancel.child_token();
        let result = tokio::select! {
            result = streamer.run(&cancel) => {
                debug!("Streamer finished first");
                result
            }
            result = health::run_health_server(self.config.port, metrics, &cancel) => {
                debug!("Health server finished first");
                result
            }
        };
        cancel.cancel();
        result
    }
}

/// 체크포인트 읽기 실패는 "체크포인트 없음"으로 취급
async fn load_checkpoint<S: GtidStore>(store: &S) -> Option<Gtid> {
    match store.read().await {
        Ok(gtid) => gtid,
        Err(e) => {
            warn!("Read last gtid failed, starting from the current position: {}", e);
            None
        }
    }
}
