//! 실패 시 마지막 GTID부터 다시 읽는 reader
//!
//! 하위 reader의 세션이 끝나면(에러든 정상 종료든) 일정 시간 대기 후
//! 지금까지 관찰한 마지막 GTID부터 세션을 다시 시작합니다.
//!
//! 커서는 라인을 읽은 시점에 전진하며, 라인이 producer로 넘어가기 전입니다.
//! 따라서 라인이 전송/체크포인트되기 전에 프로세스가 죽으면 재시작 후
//! 그 라인을 건너뛸 수 있습니다 (at-most-once 구간).

use crate::error::{CdcError, Result};
use crate::events::{GtidExtractor, RawLine};
use crate::gtid::{self, Gtid};
use crate::metrics::Metrics;
use crate::streamer::Reader;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// 세션 재시작 전 대기 시간
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(10);

pub struct ResumingReader<R, E> {
    reader: R,
    extractor: E,
    backoff: Duration,
    metrics: Arc<Metrics>,
}

impl<R: Reader, E: GtidExtractor> ResumingReader<R, E> {
    pub fn new(reader: R, extractor: E) -> Self {
        ResumingReader {
            reader,
            extractor,
            backoff: DEFAULT_RETRY_BACKOFF,
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// 라인의 GTID로 커서를 옮긴 뒤 그대로 전달
    async fn forward(
        &self,
        cursor: &Mutex<Option<Gtid>>,
        mut rx: mpsc::Receiver<RawLine>,
        out: mpsc::Sender<RawLine>,
    ) -> Result<()> {
        while let Some(line) = rx.recv().await {
            self.metrics.line_read();
            match self.extractor.extract(&line) {
                Ok(Some(gtid)) => *cursor.lock() = Some(gtid),
                Ok(None) => {}
                Err(e) => warn!("Keeping previous gtid, line has none: {}", e),
            }
            out.send(line).await.map_err(|_| CdcError::ChannelClosed)?;
        }
        Ok(())
    }

    /// 취소될 때까지 세션을 반복
    async fn restart_loop(
        &self,
        cancel: &CancellationToken,
        cursor: &Mutex<Option<Gtid>>,
        tx: mpsc::Sender<RawLine>,
    ) {
        loop {
            let gtid = *cursor.lock();
            self.metrics.session_started();
            match self.reader.read(cancel, gtid, tx.clone()).await {
                Ok(()) => debug!("Reader closed"),
                Err(e) => {
                    self.metrics.session_failed();
                    warn!("Read failed: {}", e);
                }
            }
            if cancel.is_cancelled() {
                return;
            }

            let restart_from = gtid::to_position_string(cursor.lock().as_ref());
            debug!("Restart from gtid {:?} in {:?}", restart_from, self.backoff);
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.backoff) => {}
            }
        }
    }
}

#[async_trait]
impl<R: Reader, E: GtidExtractor> Reader for ResumingReader<R, E> {
    async fn read(
        &self,
        cancel: &CancellationToken,
        gtid: Option<Gtid>,
        out: mpsc::Sender<RawLine>,
    ) -> Result<()> {
        let cursor = Mutex::new(gtid);
        let (tx, rx) = mpsc::channel(1);

        tokio::select! {
            _ = cancel.cancelled() => Ok(()),
            _ = self.restart_loop(cancel, &cursor, tx) => Ok(()),
            result = self.forward(&cursor, rx, out) => result,
        }
    }
}
