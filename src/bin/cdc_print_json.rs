/// CDC 메시지를 읽어 표준 출력으로 내보내는 도구
///
/// 재시도 없이 한 세션만 실행하며 Kafka는 사용하지 않습니다.
/// 설정은 커넥터와 같은 CDC_* 환경 변수를 사용합니다.
use maxscale_cdc_connector::cdc_client::CdcClient;
use maxscale_cdc_connector::config::AppConfig;
use maxscale_cdc_connector::events::RawLine;
use maxscale_cdc_connector::connection::TcpDialer;
use maxscale_cdc_connector::gtid::Gtid;
use maxscale_cdc_connector::shutdown;
use maxscale_cdc_connector::streamer::{default_channel_capacity, Reader};
use std::env;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env()?;
    // 시작 GTID (선택)
    let gtid = match env::var("CDC_GTID") {
        Ok(value) if !value.is_empty() => Some(Gtid::parse(&value)?),
        _ => None,
    };

    let client = CdcClient::new(
        TcpDialer::new(config.connection_config()),
        config.cdc_config(),
    );

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown::cancel_on_shutdown(cancel.clone()));

    let (tx, mut rx) = mpsc::channel::<RawLine>(default_channel_capacity());
    let printer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = rx.recv().await {
            stdout.write_all(&line).await?;
            stdout.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    client.read(&cancel, gtid, tx).await?;
    printer.await??;
    Ok(())
}
