use crate::{
    client::backpack::{DEFAULT_BASE_URL, DEFAULT_WINDOW},
    order::OrderType,
    strategy::{StrategyConfig, TerminationConfig, volume::DEFAULT_PAGE_SIZE},
};
use bytestring::ByteString;
use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
use eyre::{Context, Result, eyre};
use serde::Deserialize;

pub const CONFIG_PATH: &str = "config.yaml";
/// 环境变量前缀，例如 `BPV_API_SECRET`
pub const ENV_PREFIX: &str = "BPV";

/// 启动时加载一次，之后只读
#[derive(Clone, Deserialize)]
pub struct AppConfig {
    pub api_key: String,
    pub api_secret: String,
    pub order_type: OrderType,
    /// 最多下单次数，0 表示不限
    #[serde(default)]
    pub counts: u64,
    /// 目标成交额，0 表示不限
    #[serde(default)]
    pub total: f64,
    /// 每轮最多等待的秒数
    #[serde(default)]
    pub wait_second: u64,

    #[serde(default = "default_symbol")]
    pub symbol: ByteString,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_window")]
    pub window: u64,
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
    #[serde(default = "default_min_notional")]
    pub min_notional: f64,
    #[serde(default = "default_fee_rate")]
    pub fee_rate: f64,
    #[serde(default = "default_history_page_size")]
    pub history_page_size: u64,
}

fn default_symbol() -> ByteString {
    ByteString::from_static("SOL_USDC")
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_owned()
}

fn default_window() -> u64 {
    DEFAULT_WINDOW
}

fn default_max_poll_attempts() -> u32 {
    10
}

fn default_min_notional() -> f64 {
    1.0
}

fn default_fee_rate() -> f64 {
    0.00085
}

fn default_history_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

impl AppConfig {
    /// 从配置文件加载，同名环境变量优先
    pub fn load(path: &str) -> Result<Self> {
        Self::from_builder(
            Config::builder()
                .add_source(File::with_name(path))
                .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true)),
        )
        .wrap_err_with(|| format!("Failed to load config from {path}"))
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        Ok(builder.build()?.try_deserialize()?)
    }

    /// 交易对拆成 (基础币, 计价币)，例如 `SOL_USDC` -> (`SOL`, `USDC`)
    pub fn assets(&self) -> Result<(ByteString, ByteString)> {
        let (base, quote) = self
            .symbol
            .split_once('_')
            .filter(|(base, quote)| !base.is_empty() && !quote.is_empty())
            .ok_or_else(|| eyre!("Invalid symbol '{}', expected BASE_QUOTE", self.symbol))?;

        Ok((base.into(), quote.into()))
    }

    pub fn strategy_config(&self) -> Result<StrategyConfig> {
        let (base_asset, quote_asset) = self.assets()?;

        let termination = TerminationConfig::builder()
            .max_cycles(self.counts)
            .max_volume(self.total)
            .max_poll_attempts(self.max_poll_attempts)
            .max_wait_secs(self.wait_second)
            .build();

        Ok(StrategyConfig::builder()
            .base_asset(base_asset)
            .quote_asset(quote_asset)
            .order_type(self.order_type)
            .termination(termination)
            .min_notional(self.min_notional)
            .fee_rate(self.fee_rate)
            .history_page_size(self.history_page_size)
            .build())
    }
}
