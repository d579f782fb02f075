//! CDC 읽기와 전송을 연결하는 스트리머
//!
//! Reader → (bounded channel) → Sender
//!
//! 둘 중 하나라도 끝나면(성공/실패 무관) 공유 취소 토큰을 취소하고
//! 먼저 끝난 쪽의 결과를 반환합니다.

use crate::error::Result;
use crate::events::RawLine;
use crate::gtid::Gtid;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// 기본 채널 크기를 정할 수 없을 때 사용
pub const DEFAULT_CHANNEL_CAPACITY: usize = 4;

/// 변경 이벤트 라인을 읽어 채널로 보냄.
/// 반환 시 `tx`가 drop되어 채널이 닫힙니다.
#[async_trait]
pub trait Reader: Send + Sync {
    async fn read(
        &self,
        cancel: &CancellationToken,
        gtid: Option<Gtid>,
        tx: mpsc::Sender<RawLine>,
    ) -> Result<()>;
}

/// 채널의 라인을 외부로 전송
#[async_trait]
pub trait Sender: Send + Sync {
    async fn send(&self, cancel: &CancellationToken, rx: mpsc::Receiver<RawLine>) -> Result<()>;
}

/// 사용 가능한 병렬성 기준 채널 크기
pub fn default_channel_capacity() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(DEFAULT_CHANNEL_CAPACITY)
}

pub struct Streamer<R, S> {
    gtid: Option<Gtid>,
    reader: R,
    sender: S,
    capacity: usize,
}

impl<R: Reader, S: Sender> Streamer<R, S> {
    pub fn new(reader: R, sender: S) -> Self {
        Streamer {
            gtid: None,
            reader,
            sender,
            capacity: default_channel_capacity(),
        }
    }

    /// 시작 GTID
    pub fn with_gtid(mut self, gtid: Option<Gtid>) -> Self {
        self.gtid = gtid;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// 읽기와 전송을 동시에 실행. 먼저 끝난 쪽의 결과 반환
    pub async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        let cancel = cancel.child_token();
        let (tx, rx) = mpsc::channel(self.capacity);

        let result = tokio::select! {
            result = self.reader.read(&cancel, self.gtid, tx) => {
                debug!("Reader finished first");
                result
            }
            result = self.sender.send(&cancel, rx) => {
                debug!("Sender finished first");
                result
            }
        };

        // 남은 쪽은 select에서 drop되었고, 같은 토큰을 공유한 하위 작업도 정리
        cancel.cancel();
        result
    }
}
