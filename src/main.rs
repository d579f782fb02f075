/// MaxScale CDC → Kafka 커넥터
///
/// 설정은 환경 변수로 받습니다 (CDC_HOST, CDC_USER, KAFKA_BROKERS 등).
use maxscale_cdc_connector::app::App;
use maxscale_cdc_connector::config::AppConfig;
use maxscale_cdc_connector::shutdown;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 초기화
    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env()?;
    config.log();
    let app = App::new(config)?;

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown::cancel_on_shutdown(cancel.clone()));

    info!("App started");
    app.run(&cancel).await?;
    info!("App finished");
    Ok(())
}
