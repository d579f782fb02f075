//! 애플리케이션 설정 (환경 변수)

use crate::cdc_client::CdcConfig;
use crate::connection::ConnectionConfig;
use crate::error::{CdcError, Result};
use crate::events::Format;
use crate::producer::{KafkaConfig, KeyMode};
use crate::retry_reader::DEFAULT_RETRY_BACKOFF;
use crate::streamer::default_channel_capacity;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// 상태 확인 서버 기본 포트
pub const DEFAULT_PORT: u16 = 9001;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// 상태 확인 / 메트릭 HTTP 포트
    pub port: u16,
    pub cdc_host: String,
    pub cdc_port: u16,
    pub cdc_user: String,
    pub cdc_password: String,
    pub cdc_database: String,
    pub cdc_table: String,
    pub cdc_version: String,
    pub cdc_uuid: String,
    pub cdc_format: Format,
    pub kafka_brokers: String,
    pub kafka_topic: String,
    pub kafka_key: KeyMode,
    pub data_dir: PathBuf,
    pub channel_capacity: usize,
    pub retry_backoff: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 키 조회 함수로부터 설정 생성 (테스트용)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).unwrap_or_default();

        Ok(AppConfig {
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            cdc_host: var("CDC_HOST"),
            cdc_port: parse_or(&lookup, "CDC_PORT", 4001)?,
            cdc_user: var("CDC_USER"),
            cdc_password: var("CDC_PASSWORD"),
            cdc_database: var("CDC_DATABASE"),
            cdc_table: var("CDC_TABLE"),
            cdc_version: var("CDC_VERSION"),
            cdc_uuid: lookup("CDC_UUID").unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            cdc_format: parse_or(&lookup, "CDC_FORMAT", Format::Json)?,
            kafka_brokers: var("KAFKA_BROKERS"),
            kafka_topic: var("KAFKA_TOPIC"),
            kafka_key: parse_or(&lookup, "KAFKA_KEY", KeyMode::Gtid)?,
            data_dir: PathBuf::from(lookup("DATA_DIR").unwrap_or_else(|| ".".to_string())),
            channel_capacity: parse_or(&lookup, "CHANNEL_CAPACITY", default_channel_capacity())?,
            retry_backoff: Duration::from_secs(parse_or(
                &lookup,
                "RETRY_BACKOFF_SECS",
                DEFAULT_RETRY_BACKOFF.as_secs(),
            )?),
        })
    }

    /// 필수 값 확인
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("CDC_HOST", &self.cdc_host),
            ("CDC_USER", &self.cdc_user),
            ("CDC_PASSWORD", &self.cdc_password),
            ("CDC_DATABASE", &self.cdc_database),
            ("CDC_TABLE", &self.cdc_table),
            ("CDC_UUID", &self.cdc_uuid),
            ("KAFKA_BROKERS", &self.kafka_brokers),
            ("KAFKA_TOPIC", &self.kafka_topic),
        ];
        for (name, value) in required {
            if value.is_empty() {
                return Err(CdcError::ConfigError(format!("{} missing", name)));
            }
        }
        if self.port == 0 {
            return Err(CdcError::ConfigError("PORT missing".to_string()));
        }
        if self.cdc_port == 0 {
            return Err(CdcError::ConfigError("CDC_PORT missing".to_string()));
        }
        if self.channel_capacity == 0 {
            return Err(CdcError::ConfigError(
                "CHANNEL_CAPACITY must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig::new(self.cdc_host.clone(), self.cdc_port)
    }

    pub fn cdc_config(&self) -> CdcConfig {
        CdcConfig {
            username: self.cdc_user.clone(),
            password: self.cdc_password.clone(),
            uuid: self.cdc_uuid.clone(),
            format: self.cdc_format,
            database: self.cdc_database.clone(),
            table: self.cdc_table.clone(),
            version: self.cdc_version.clone(),
        }
    }

    pub fn kafka_config(&self) -> KafkaConfig {
        KafkaConfig::new(self.kafka_brokers.clone(), self.kafka_topic.clone())
    }

    /// 설정 값 로그. 비밀번호는 길이만
    pub fn log(&self) {
        info!("Parameter Port: {}", self.port);
        info!("Parameter CdcHost: {}", self.cdc_host);
        info!("Parameter CdcPort: {}", self.cdc_port);
        info!("Parameter CdcUser: {}", self.cdc_user);
        info!("Parameter CdcPassword-Length: {}", self.cdc_password.len());
        info!("Parameter CdcDatabase: {}", self.cdc_database);
        info!("Parameter CdcTable: {}", self.cdc_table);
        info!("Parameter CdcVersion: {}", self.cdc_version);
        info!("Parameter CdcUUID: {}", self.cdc_uuid);
        info!("Parameter CdcFormat: {}", self.cdc_format);
        info!("Parameter KafkaBrokers: {}", self.kafka_brokers);
        info!("Parameter KafkaTopic: {}", self.kafka_topic);
        info!("Parameter KafkaKey: {}", self.kafka_key);
        info!("Parameter DataDir: {}", self.data_dir.display());
        info!("Parameter ChannelCapacity: {}", self.channel_capacity);
        info!("Parameter RetryBackoff: {:?}", self.retry_backoff);
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if !value.is_empty() => value
            .parse()
            .map_err(|e| CdcError::ConfigError(format!("invalid {} {:?}: {}", key, value, e))),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("CDC_HOST", "myhost"),
            ("CDC_PORT", "4001"),
            ("CDC_USER", "myuser"),
            ("CDC_PASSWORD", "mypass"),
            ("CDC_DATABASE", "mydb"),
            ("CDC_TABLE", "mytable"),
            ("CDC_UUID", "0f672312-e02a-11e8-8c13-cf8f48795343"),
            ("CDC_FORMAT", "JSON"),
            ("KAFKA_BROKERS", "kafka:9092"),
            ("KAFKA_TOPIC", "mytopic"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<AppConfig> {
        AppConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn test_validate_without_error() {
        let config = load(&vars()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.cdc_port, 4001);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.cdc_format, Format::Json);
        assert_eq!(config.kafka_key, KeyMode::Gtid);
        assert_eq!(config.retry_backoff, Duration::from_secs(10));
        assert_eq!(config.data_dir, PathBuf::from("."));
    }

    #[test]
    fn test_validate_missing_fields() {
        for key in [
            "CDC_HOST",
            "CDC_USER",
            "CDC_PASSWORD",
            "CDC_DATABASE",
            "CDC_TABLE",
            "KAFKA_BROKERS",
            "KAFKA_TOPIC",
        ] {
            let mut vars = vars();
            vars.remove(key);
            let config = load(&vars).unwrap();
            match config.validate() {
                Err(CdcError::ConfigError(msg)) => assert!(msg.contains(key)),
                other => panic!("expected config error for {}, got {:?}", key, other),
            }
        }
    }

    #[test]
    fn test_invalid_format() {
        let mut vars = vars();
        vars.insert("CDC_FORMAT", "banana");
        assert!(matches!(load(&vars), Err(CdcError::ConfigError(_))));
    }

    #[test]
    fn test_invalid_port() {
        let mut vars = vars();
        vars.insert("CDC_PORT", "banana");
        assert!(matches!(load(&vars), Err(CdcError::ConfigError(_))));

        vars.insert("CDC_PORT", "0");
        assert!(load(&vars).unwrap().validate().is_err());
    }

    #[test]
    fn test_default_uuid_generated() {
        let mut vars = vars();
        vars.remove("CDC_UUID");
        let config = load(&vars).unwrap();
        assert!(uuid::Uuid::parse_str(&config.cdc_uuid).is_ok());
    }

    #[test]
    fn test_overrides() {
        let mut vars = vars();
        vars.insert("CDC_FORMAT", "AVRO");
        vars.insert("KAFKA_KEY", "SEQUENCE");
        vars.insert("DATA_DIR", "/var/lib/cdc");
        vars.insert("CHANNEL_CAPACITY", "8");
        vars.insert("RETRY_BACKOFF_SECS", "3");
        vars.insert("CDC_VERSION", "2");
        let config = load(&vars).unwrap();
        assert_eq!(config.cdc_format, Format::Avro);
        assert_eq!(config.kafka_key, KeyMode::Sequence);
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/cdc"));
        assert_eq!(config.channel_capacity, 8);
        assert_eq!(config.retry_backoff, Duration::from_secs(3));
        assert_eq!(config.cdc_config().version, "2");
        assert_eq!(config.connection_config().address(), "myhost:4001");
    }

    #[test]
    fn test_zero_port_rejected() {
        let mut vars = vars();
        vars.insert("PORT", "0");
        match load(&vars).unwrap().validate() {
            Err(CdcError::ConfigError(msg)) => assert_eq!(msg, "PORT missing"),
            other => panic!("expected config error, got {:?}", other),
        }

        vars.insert("PORT", "8080");
        let config = load(&vars).unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut vars = vars();
        vars.insert("CHANNEL_CAPACITY", "0");
        assert!(load(&vars).unwrap().validate().is_err());
    }
}
