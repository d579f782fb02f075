//! 마지막으로 처리한 GTID 저장 (체크포인트)
//!
//! 데이터 디렉터리의 `lastgtid` 파일 하나에 GTID 텍스트만 기록합니다.
//! 재시작 시 이 값부터 스트리밍을 다시 요청합니다.

use crate::error::{CdcError, Result};
use crate::gtid::Gtid;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// 체크포인트 파일명
pub const CHECKPOINT_FILE: &str = "lastgtid";

/// 체크포인트 저장소
#[async_trait]
pub trait GtidStore: Send + Sync {
    /// 마지막 GTID 읽기. 저장된 값이 없으면 `None`
    async fn read(&self) -> Result<Option<Gtid>>;

    /// GTID 저장
    async fn write(&self, gtid: &Gtid) -> Result<()>;
}

/// 파일 기반 체크포인트 저장소
#[derive(Debug, Clone)]
pub struct FileGtidStore {
    data_dir: PathBuf,
}

impl FileGtidStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        FileGtidStore {
            data_dir: data_dir.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.data_dir.join(CHECKPOINT_FILE)
    }

    fn tmp_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.tmp", CHECKPOINT_FILE))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

#[async_trait]
impl GtidStore for FileGtidStore {
    async fn read(&self) -> Result<Option<Gtid>> {
        let path = self.path();
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No checkpoint at {}", path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(CdcError::IoError(format!(
                    "read file {} failed: {}",
                    path.display(),
                    e
                )))
            }
        };

        if content.is_empty() {
            return Ok(None);
        }
        Gtid::parse(&content).map(Some)
    }

    async fn write(&self, gtid: &Gtid) -> Result<()> {
        // 기록 도중 종료되어도 이전 체크포인트가 남도록 임시 파일 후 rename.
        // rename 전에 내용을 디스크에 반영해야 빈 파일이 남지 않음
        let tmp = self.tmp_path();
        write_synced(&tmp, gtid.to_string().as_bytes())
            .await
            .map_err(|e| {
                CdcError::CheckpointError(format!("write file {} failed: {}", tmp.display(), e))
            })?;
        tokio::fs::rename(&tmp, self.path()).await.map_err(|e| {
            CdcError::CheckpointError(format!(
                "rename {} to {} failed: {}",
                tmp.display(),
                self.path().display(),
                e
            ))
        })?;
        debug!("Saved checkpoint {}", gtid);
        Ok(())
    }
}

async fn write_synced(path: &Path, content: &[u8]) -> io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(content).await?;
    file.sync_all().await
}
