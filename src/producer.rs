//! CDC 라인을 Kafka 토픽으로 전송
//!
//! 라인마다:
//! 1. GTID 추출
//! 2. Kafka로 전송 (acks=all, 브로커 응답까지 대기)
//! 3. 전송 성공 후에만 GTID를 체크포인트로 저장
//!
//! 전송/체크포인트 실패는 복구하지 않고 에러로 반환합니다.

use crate::error::{CdcError, Result};
use crate::events::{GtidExtractor, RawLine, StructuredRecord};
use crate::metrics::Metrics;
use crate::offset::GtidStore;
use crate::streamer::Sender;
use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 브로커 측 재시도 횟수
pub const PUBLISH_RETRIES: u32 = 10;

/// 메시지 한 건의 전송 대기 시간
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// 메시지 키 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMode {
    /// 키 = GTID, 값 = 원본 라인
    Gtid,
    /// 키 = 레코드의 `sequence` 필드, 값 = 재인코딩한 JSON
    Sequence,
}

impl KeyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyMode::Gtid => "GTID",
            KeyMode::Sequence => "SEQUENCE",
        }
    }
}

impl FromStr for KeyMode {
    type Err = CdcError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "GTID" => Ok(KeyMode::Gtid),
            "SEQUENCE" => Ok(KeyMode::Sequence),
            other => Err(CdcError::ConfigError(format!(
                "unsupported key mode {:?} (GTID|SEQUENCE)",
                other
            ))),
        }
    }
}

impl fmt::Display for KeyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 메시지 전송 (브로커 확인까지 대기)
#[async_trait]
pub trait MessageProducer: Send + Sync {
    async fn publish(&self, key: Option<&str>, payload: &[u8]) -> Result<()>;
}

/// `send` 호출마다 하나의 producer 연결 생성
#[async_trait]
pub trait ProducerFactory: Send + Sync {
    async fn create(&self) -> Result<Box<dyn MessageProducer>>;
}

/// Kafka 설정
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    /// 쉼표로 구분한 브로커 목록
    pub brokers: String,
    pub topic: String,
    pub delivery_timeout: Duration,
}

impl KafkaConfig {
    pub fn new(brokers: impl Into<String>, topic: impl Into<String>) -> Self {
        KafkaConfig {
            brokers: brokers.into(),
            topic: topic.into(),
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
        }
    }
}

/// rdkafka 기반 producer 생성
#[derive(Debug, Clone)]
pub struct KafkaProducerFactory {
    config: KafkaConfig,
}

impl KafkaProducerFactory {
    pub fn new(config: KafkaConfig) -> Self {
        KafkaProducerFactory { config }
    }
}

#[async_trait]
impl ProducerFactory for KafkaProducerFactory {
    async fn create(&self) -> Result<Box<dyn MessageProducer>> {
        debug!("Connecting to brokers {}", self.config.brokers);

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &self.config.brokers)
            .set("acks", "all")
            .set("retries", PUBLISH_RETRIES.to_string())
            .set(
                "message.timeout.ms",
                self.config.delivery_timeout.as_millis().to_string(),
            )
            .create()
            .map_err(|e| CdcError::PublishError(format!("create producer failed: {}", e)))?;

        Ok(Box::new(KafkaProducer {
            producer,
            topic: self.config.topic.clone(),
            timeout: self.config.delivery_timeout,
        }))
    }
}

/// Kafka producer 래퍼
pub struct KafkaProducer {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

#[async_trait]
impl MessageProducer for KafkaProducer {
    async fn publish(&self, key: Option<&str>, payload: &[u8]) -> Result<()> {
        let mut record = FutureRecord::<str, [u8]>::to(&self.topic).payload(payload);
        if let Some(key) = key {
            record = record.key(key);
        }

        match self.producer.send(record, self.timeout).await {
            Ok((partition, offset)) => {
                debug!(
                    "Send message successful to {} with partition {} offset {}",
                    self.topic, partition, offset
                );
                Ok(())
            }
            Err((e, _)) => Err(CdcError::PublishError(format!(
                "send message to {} failed: {}",
                self.topic, e
            ))),
        }
    }
}

/// 채널의 라인을 전송하고 체크포인트를 남기는 sender
pub struct KafkaSender<F, S, E> {
    factory: F,
    store: S,
    extractor: E,
    key_mode: KeyMode,
    metrics: Arc<Metrics>,
}

impl<F: ProducerFactory, S: GtidStore, E: GtidExtractor> KafkaSender<F, S, E> {
    pub fn new(factory: F, store: S, extractor: E) -> Self {
        KafkaSender {
            factory,
            store,
            extractor,
            key_mode: KeyMode::Gtid,
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn with_key_mode(mut self, key_mode: KeyMode) -> Self {
        self.key_mode = key_mode;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    async fn handle_line(&self, producer: &dyn MessageProducer, line: &[u8]) -> Result<()> {
        let gtid = self
            .extractor
            .extract(line)
            .map_err(|e| CdcError::GtidError(format!("extract gtid failed: {}", e)))?;

        match self.key_mode {
            KeyMode::Gtid => {
                let key = gtid.map(|g| g.to_string());
                producer.publish(key.as_deref(), line).await?;
            }
            KeyMode::Sequence => {
                let record = StructuredRecord::parse(line)?;
                let key = record.sequence_key();
                if key.is_none() {
                    warn!("Sequence not found in json");
                }
                producer.publish(key.as_deref(), &record.encode()?).await?;
            }
        }
        self.metrics.message_published();

        // 전송이 확인된 라인만 체크포인트
        if let Some(gtid) = gtid {
            self.store.write(&gtid).await.map_err(|e| {
                CdcError::CheckpointError(format!("save gtid {} failed: {}", gtid, e))
            })?;
            self.metrics.checkpoint_written();
        }
        Ok(())
    }
}

#[async_trait]
impl<F: ProducerFactory, S: GtidStore, E: GtidExtractor> Sender for KafkaSender<F, S, E> {
    async fn send(&self, cancel: &CancellationToken, mut rx: mpsc::Receiver<RawLine>) -> Result<()> {
        let producer = self.factory.create().await?;
        info!("Wait for lines");

        loop {
            let line = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                line = rx.recv() => match line {
                    Some(line) => line,
                    None => return Ok(()),
                },
            };
            self.handle_line(producer.as_ref(), &line).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Format, FormatGtidExtractor};
    use crate::gtid::Gtid;
    use bytes::Bytes;
    use parking_lot::Mutex;

    const LINE_5: &[u8] = b"{\"domain\": 0, \"server_id\": 1, \"sequence\": 5}\n";
    const LINE_6: &[u8] = b"{\"domain\": 0, \"server_id\": 1, \"sequence\": 6}\n";
    const SCHEMA: &[u8] = b"{\"namespace\": \"MaxScaleChangeDataSchema.avro\", \"type\": \"record\"}\n";

    type Published = Arc<Mutex<Vec<(Option<String>, Vec<u8>)>>>;

    /// 전송 내용을 기록. `fail_on`번째 전송(0부터)은 실패
    #[derive(Clone, Default)]
    struct MockFactory {
        published: Published,
        fail_on: Option<usize>,
        creates: Arc<Mutex<usize>>,
    }

    struct MockProducer {
        published: Published,
        fail_on: Option<usize>,
        attempts: Mutex<usize>,
    }

    #[async_trait]
    impl ProducerFactory for MockFactory {
        async fn create(&self) -> Result<Box<dyn MessageProducer>> {
            *self.creates.lock() += 1;
            Ok(Box::new(MockProducer {
                published: self.published.clone(),
                fail_on: self.fail_on,
                attempts: Mutex::new(0),
            }))
        }
    }

    #[async_trait]
    impl MessageProducer for MockProducer {
        async fn publish(&self, key: Option<&str>, payload: &[u8]) -> Result<()> {
            let attempt = {
                let mut attempts = self.attempts.lock();
                *attempts += 1;
                *attempts - 1
            };
            if self.fail_on == Some(attempt) {
                return Err(CdcError::PublishError("broker down".to_string()));
            }
            self.published
                .lock()
                .push((key.map(str::to_string), payload.to_vec()));
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct MemoryStore {
        writes: Arc<Mutex<Vec<Gtid>>>,
        fail: bool,
    }

    #[async_trait]
    impl GtidStore for MemoryStore {
        async fn read(&self) -> Result<Option<Gtid>> {
            Ok(self.writes.lock().last().copied())
        }

        async fn write(&self, gtid: &Gtid) -> Result<()> {
            if self.fail {
                return Err(CdcError::CheckpointError("disk full".to_string()));
            }
            self.writes.lock().push(*gtid);
            Ok(())
        }
    }

    fn sender(factory: MockFactory, store: MemoryStore) -> KafkaSender<MockFactory, MemoryStore, FormatGtidExtractor> {
        KafkaSender::new(factory, store, FormatGtidExtractor::new(Format::Json))
    }

    async fn run(sender: &KafkaSender<MockFactory, MemoryStore, FormatGtidExtractor>, lines: &[&'static [u8]]) -> Result<()> {
        let (tx, rx) = mpsc::channel(lines.len().max(1));
        for line in lines {
            tx.send(Bytes::from_static(line)).await.unwrap();
        }
        drop(tx);
        sender.send(&CancellationToken::new(), rx).await
    }

    #[tokio::test]
    async fn test_publish_then_checkpoint() {
        let factory = MockFactory::default();
        let store = MemoryStore::default();
        let sender = sender(factory.clone(), store.clone());

        run(&sender, &[LINE_5, LINE_6]).await.unwrap();

        let published = factory.published.lock();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0], (Some("0-1-5".to_string()), LINE_5.to_vec()));
        assert_eq!(published[1], (Some("0-1-6".to_string()), LINE_6.to_vec()));
        assert_eq!(
            store.writes.lock().as_slice(),
            &[Gtid::new(0, 1, 5), Gtid::new(0, 1, 6)]
        );
        assert_eq!(*factory.creates.lock(), 1);
    }

    #[tokio::test]
    async fn test_no_checkpoint_when_publish_fails() {
        let factory = MockFactory {
            fail_on: Some(1),
            ..Default::default()
        };
        let store = MemoryStore::default();
        let sender = sender(factory.clone(), store.clone());

        let result = run(&sender, &[LINE_5, LINE_6]).await;
        assert!(matches!(result, Err(CdcError::PublishError(_))));
        assert_eq!(store.writes.lock().as_slice(), &[Gtid::new(0, 1, 5)]);
    }

    #[tokio::test]
    async fn test_metrics_count_published_and_checkpointed() {
        let metrics = Arc::new(Metrics::new());
        let sender = sender(MockFactory::default(), MemoryStore::default())
            .with_metrics(metrics.clone());

        run(&sender, &[SCHEMA, LINE_5]).await.unwrap();
        assert_eq!(metrics.messages_published(), 2);
        assert_eq!(metrics.checkpoints_written(), 1);
    }

    #[tokio::test]
    async fn test_checkpoint_failure_aborts() {
        let factory = MockFactory::default();
        let store = MemoryStore {
            fail: true,
            ..Default::default()
        };
        let sender = sender(factory.clone(), store);

        let result = run(&sender, &[LINE_5, LINE_6]).await;
        assert!(matches!(result, Err(CdcError::CheckpointError(_))));
        assert_eq!(factory.published.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_schema_record_published_without_checkpoint() {
        let factory = MockFactory::default();
        let store = MemoryStore::default();
        let sender = sender(factory.clone(), store.clone());

        run(&sender, &[SCHEMA, LINE_5]).await.unwrap();

        let published = factory.published.lock();
        assert_eq!(published[0], (None, SCHEMA.to_vec()));
        assert_eq!(store.writes.lock().as_slice(), &[Gtid::new(0, 1, 5)]);
    }

    #[tokio::test]
    async fn test_unparsable_line_aborts() {
        let factory = MockFactory::default();
        let store = MemoryStore::default();
        let sender = sender(factory.clone(), store.clone());

        let result = run(&sender, &[&b"hello world\n"[..]]).await;
        assert!(matches!(result, Err(CdcError::GtidError(_))));
        assert!(factory.published.lock().is_empty());
        assert!(store.writes.lock().is_empty());
    }

    #[tokio::test]
    async fn test_sequence_key_mode() {
        let factory = MockFactory::default();
        let store = MemoryStore::default();
        let sender = sender(factory.clone(), store.clone()).with_key_mode(KeyMode::Sequence);

        run(&sender, &[LINE_5]).await.unwrap();

        let published = factory.published.lock();
        assert_eq!(published[0].0.as_deref(), Some("5"));
        let value: serde_json::Value = serde_json::from_slice(&published[0].1).unwrap();
        assert_eq!(value["server_id"], 1);
        assert_eq!(published[0].1.last(), Some(&b'\n'));
        assert_eq!(store.writes.lock().as_slice(), &[Gtid::new(0, 1, 5)]);
    }

    #[tokio::test]
    async fn test_cancel_returns_ok() {
        let factory = MockFactory::default();
        let sender = sender(factory.clone(), MemoryStore::default());
        let (_tx, rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(sender.send(&cancel, rx).await.is_ok());
        assert!(factory.published.lock().is_empty());
    }

    #[test]
    fn test_key_mode_parse() {
        assert_eq!("GTID".parse::<KeyMode>().unwrap(), KeyMode::Gtid);
        assert_eq!("SEQUENCE".parse::<KeyMode>().unwrap(), KeyMode::Sequence);
        assert!("banana".parse::<KeyMode>().is_err());
    }
}
