//! Prometheus 텍스트 형식 메트릭
//!
//! `/metrics` 엔드포인트에서 노출합니다.
//! - 읽은 라인 수 / 세션 시작 수 / 세션 실패 수
//! - Kafka 전송 수 / 체크포인트 기록 수
//! - 가동 시간

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// 파이프라인 카운터
#[derive(Debug)]
pub struct Metrics {
    started_at: Instant,
    lines_read: AtomicU64,
    sessions_started: AtomicU64,
    session_failures: AtomicU64,
    messages_published: AtomicU64,
    checkpoints_written: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics {
            started_at: Instant::now(),
            lines_read: AtomicU64::new(0),
            sessions_started: AtomicU64::new(0),
            session_failures: AtomicU64::new(0),
            messages_published: AtomicU64::new(0),
            checkpoints_written: AtomicU64::new(0),
        }
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line_read(&self) {
        self.lines_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_failed(&self) {
        self.session_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_published(&self) {
        self.messages_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn checkpoint_written(&self) {
        self.checkpoints_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn lines_read(&self) -> u64 {
        self.lines_read.load(Ordering::Relaxed)
    }

    pub fn sessions_started(&self) -> u64 {
        self.sessions_started.load(Ordering::Relaxed)
    }

    pub fn session_failures(&self) -> u64 {
        self.session_failures.load(Ordering::Relaxed)
    }

    pub fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }

    pub fn checkpoints_written(&self) -> u64 {
        self.checkpoints_written.load(Ordering::Relaxed)
    }

    /// Prometheus exposition 형식으로 출력
    pub fn render(&self) -> String {
        let mut out = String::new();
        let counters = [
            (
                "cdc_lines_read_total",
                "Lines read from the CDC stream",
                self.lines_read(),
            ),
            (
                "cdc_sessions_started_total",
                "CDC sessions started",
                self.sessions_started(),
            ),
            (
                "cdc_session_failures_total",
                "CDC sessions that ended with an error",
                self.session_failures(),
            ),
            (
                "cdc_messages_published_total",
                "Messages acknowledged by Kafka",
                self.messages_published(),
            ),
            (
                "cdc_checkpoints_written_total",
                "GTID checkpoints written",
                self.checkpoints_written(),
            ),
        ];
        for (name, help, value) in counters {
            let _ = writeln!(out, "# HELP {} {}", name, help);
            let _ = writeln!(out, "# TYPE {} counter", name);
            let _ = writeln!(out, "{} {}", name, value);
        }

        let _ = writeln!(out, "# HELP cdc_uptime_seconds Process uptime");
        let _ = writeln!(out, "# TYPE cdc_uptime_seconds gauge");
        let _ = writeln!(
            out,
            "cdc_uptime_seconds {}",
            self.started_at.elapsed().as_secs()
        );
        out
    }
}
