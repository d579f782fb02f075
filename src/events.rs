//! MaxScale CDC 이벤트 라인 및 GTID 추출
//!
//! 스트림의 각 라인은 하나의 변경 이벤트입니다. 내용은 그대로 전달하고,
//! 재시작/체크포인트에 필요한 GTID만 꺼냅니다.
//!
//! JSON 형식 예:
//! `{"domain": 0, "server_id": 3000, "sequence": 11, "event_number": 1, "event_type": "insert", ...}`
//!
//! 스트림의 첫 라인은 테이블 스키마 레코드이며 GTID 필드가 없습니다.

use crate::error::{CdcError, Result};
use crate::gtid::Gtid;
use bytes::Bytes;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// 줄바꿈을 포함한 원본 이벤트 라인
pub type RawLine = Bytes;

/// CDC 출력 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Json,
    Avro,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Json => "JSON",
            Format::Avro => "AVRO",
        }
    }
}

impl FromStr for Format {
    type Err = CdcError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "JSON" => Ok(Format::Json),
            "AVRO" => Ok(Format::Avro),
            other => Err(CdcError::ConfigError(format!(
                "unsupported format {:?} (JSON|AVRO)",
                other
            ))),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 이벤트 라인에서 GTID 추출
pub trait GtidExtractor: Send + Sync {
    /// GTID가 없는 정상 레코드(스키마 레코드)는 `Ok(None)`
    fn extract(&self, line: &[u8]) -> Result<Option<Gtid>>;
}

#[derive(Debug, Deserialize)]
struct GtidFields {
    domain: Option<u32>,
    server_id: Option<u32>,
    sequence: Option<u64>,
}

/// 형식별 GTID 추출기
#[derive(Debug, Clone, Copy)]
pub struct FormatGtidExtractor {
    format: Format,
}

impl FormatGtidExtractor {
    pub fn new(format: Format) -> Self {
        FormatGtidExtractor { format }
    }
}

impl GtidExtractor for FormatGtidExtractor {
    fn extract(&self, line: &[u8]) -> Result<Option<Gtid>> {
        match self.format {
            Format::Json => extract_json(line),
            Format::Avro => Err(CdcError::GtidError(
                "GTID extraction for AVRO is not supported".to_string(),
            )),
        }
    }
}

fn extract_json(line: &[u8]) -> Result<Option<Gtid>> {
    let fields: GtidFields = serde_json::from_slice(line)
        .map_err(|e| CdcError::GtidError(format!("decode json failed: {}", e)))?;

    match (fields.domain, fields.server_id, fields.sequence) {
        (Some(domain), Some(server_id), Some(sequence)) => {
            Ok(Some(Gtid::new(domain, server_id, sequence)))
        }
        (None, None, None) => Ok(None),
        _ => Err(CdcError::GtidError(
            "record has incomplete GTID fields".to_string(),
        )),
    }
}

/// 구조화된 레코드 (JSON 객체 재인코딩용)
#[derive(Debug, Clone)]
pub struct StructuredRecord {
    value: serde_json::Map<String, serde_json::Value>,
}

impl StructuredRecord {
    pub fn parse(line: &[u8]) -> Result<Self> {
        let value = serde_json::from_slice(line)?;
        Ok(StructuredRecord { value })
    }

    /// `sequence` 필드를 키 문자열로. 문자열 값은 따옴표 없이 그대로
    pub fn sequence_key(&self) -> Option<String> {
        self.value.get("sequence").map(|v| match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// 줄바꿈으로 끝나는 JSON
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = serde_json::to_vec(&self.value)?;
        buf.push(b'\n');
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INSERT: &[u8] = br#"{"domain": 0, "server_id": 3000, "sequence": 11, "event_number": 1, "timestamp": 1519220926, "event_type": "insert", "id": 1}
"#;

    const SCHEMA: &[u8] = br#"{"namespace": "MaxScaleChangeDataSchema.avro", "type": "record", "name": "ChangeRecord", "fields": []}
"#;

    #[test]
    fn test_format_parse() {
        assert_eq!("JSON".parse::<Format>().unwrap(), Format::Json);
        assert_eq!("AVRO".parse::<Format>().unwrap(), Format::Avro);
        assert!("banana".parse::<Format>().is_err());
        assert!("json".parse::<Format>().is_err());
        assert_eq!(Format::Avro.to_string(), "AVRO");
    }

    #[test]
    fn test_extract_json_gtid() {
        let extractor = FormatGtidExtractor::new(Format::Json);
        assert_eq!(
            extractor.extract(INSERT).unwrap(),
            Some(Gtid::new(0, 3000, 11))
        );
    }

    #[test]
    fn test_extract_schema_record() {
        let extractor = FormatGtidExtractor::new(Format::Json);
        assert_eq!(extractor.extract(SCHEMA).unwrap(), None);
    }

    #[test]
    fn test_extract_invalid() {
        let extractor = FormatGtidExtractor::new(Format::Json);
        assert!(extractor.extract(b"line 3\n").is_err());
        assert!(extractor.extract(br#"{"domain": 0, "sequence": 1}"#).is_err());
        assert!(extractor.extract(br#"{"domain": -1, "server_id": 1, "sequence": 1}"#).is_err());
    }

    #[test]
    fn test_extract_avro_unsupported() {
        let extractor = FormatGtidExtractor::new(Format::Avro);
        assert!(matches!(
            extractor.extract(INSERT),
            Err(CdcError::GtidError(_))
        ));
    }

    #[test]
    fn test_structured_record() {
        let record = StructuredRecord::parse(INSERT).unwrap();
        assert_eq!(record.sequence_key().as_deref(), Some("11"));

        let encoded = record.encode().unwrap();
        assert_eq!(encoded.last(), Some(&b'\n'));
        let decoded: serde_json::Value = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(decoded["event_type"], "insert");
    }

    #[test]
    fn test_structured_record_string_sequence() {
        let record = StructuredRecord::parse(br#"{"sequence": "abc"}"#).unwrap();
        assert_eq!(record.sequence_key().as_deref(), Some("abc"));

        let record = StructuredRecord::parse(SCHEMA).unwrap();
        assert_eq!(record.sequence_key(), None);
    }
}
