use bpvol::{
    client::backpack::{BackpackClient, sign::Credentials},
    clock::TokioSleeper,
    config::{AppConfig, CONFIG_PATH},
    strategy::{Strategy, Termination},
};
use eyre::{Result, WrapErr};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // .env 不存在时忽略
    dotenvy::dotenv().ok();

    match run().await {
        Ok(termination) => {
            info!(%termination, "策略结束");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<Termination> {
    let config = AppConfig::load(CONFIG_PATH)?;

    let credentials = Credentials::from_base64(&config.api_key, &config.api_secret)
        .wrap_err("API KEY 验证不通过，请确认填写是否正确")?;
    info!(api_key = credentials.api_key(), "API KEY 验证通过");

    let client = BackpackClient::builder()
        .credentials(credentials)
        .symbol(config.symbol.clone())
        .base_url(&config.base_url)
        .window(config.window)
        .build()?;

    let token = CancellationToken::new();
    tokio::spawn({
        let token = token.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    warn!("收到停止信号，等待当前请求完成");
                    token.cancel();
                }
                Err(e) => warn!("无法监听停止信号: {e}"),
            }
        }
    });

    let mut strategy = Strategy::builder()
        .exchange(client)
        .sleeper(TokioSleeper::new(token))
        .config(config.strategy_config()?)
        .build();

    Ok(strategy.run().await)
}
