//! MariaDB GTID (Global Transaction ID) 관리
//!
//! GTID 형식: domain-server_id-sequence
//! 예: "0-3000-11" (도메인 0, 서버 3000, 시퀀스 11)
//!
//! GTID가 없는 경우(체크포인트 없음)는 빈 문자열로 표현되며,
//! 현재 스트림의 끝에서부터 읽기를 시작한다는 의미입니다.

use crate::error::{CdcError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 변경 스트림 내의 한 지점
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Gtid {
    pub domain: u32,
    pub server_id: u32,
    pub sequence: u64,
}

impl Gtid {
    pub fn new(domain: u32, server_id: u32, sequence: u64) -> Self {
        Gtid {
            domain,
            server_id,
            sequence,
        }
    }

    /// GTID 문자열 파싱 (format: "domain-server_id-sequence")
    pub fn parse(gtid_str: &str) -> Result<Self> {
        let parts: Vec<&str> = gtid_str.split('-').collect();
        if parts.len() != 3 {
            return Err(CdcError::GtidError(format!(
                "Invalid GTID format: {:?}",
                gtid_str
            )));
        }

        Ok(Gtid {
            domain: parse_field(parts[0], gtid_str)?,
            server_id: parse_field(parts[1], gtid_str)?,
            sequence: parse_field(parts[2], gtid_str)?,
        })
    }
}

// u32/u64 파서는 '+' 부호를 허용하므로 숫자만 있는지 먼저 확인
fn parse_field<T: FromStr>(field: &str, gtid_str: &str) -> Result<T> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CdcError::GtidError(format!(
            "Invalid GTID field {:?} in {:?}",
            field, gtid_str
        )));
    }
    field
        .parse::<T>()
        .map_err(|_| CdcError::GtidError(format!("GTID field out of range: {:?}", field)))
}

impl FromStr for Gtid {
    type Err = CdcError;

    fn from_str(s: &str) -> Result<Self> {
        Gtid::parse(s)
    }
}

impl fmt::Display for Gtid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.domain, self.server_id, self.sequence)
    }
}

/// GTID를 텍스트로 변환. 없으면 빈 문자열
pub fn to_position_string(gtid: Option<&Gtid>) -> String {
    gtid.map(|g| g.to_string()).unwrap_or_default()
}
