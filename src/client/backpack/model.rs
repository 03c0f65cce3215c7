use crate::{
    data::{AssetBalance, Balances, BookData},
    order::{Order, OrderStatus, OrderType, Side},
};
use bytestring::ByteString;
use eyre::{Context, Result};
use serde::Deserialize;
use serde_with::{DisplayFromStr, serde_as};
use std::collections::HashMap;

#[serde_as]
#[derive(Debug, Default, Deserialize)]
pub struct BackpackAssetBalance {
    #[serde_as(as = "DisplayFromStr")]
    pub available: f64,
    #[serde_as(as = "DisplayFromStr")]
    pub locked: f64,
    #[serde_as(as = "DisplayFromStr")]
    pub staked: f64,
}

/// 币种 -> 余额
pub type BackpackBalances = HashMap<ByteString, BackpackAssetBalance>;

impl From<BackpackAssetBalance> for AssetBalance {
    fn from(value: BackpackAssetBalance) -> Self {
        Self {
            available: value.available,
            locked: value.locked,
            staked: value.staked,
        }
    }
}

pub fn into_balances(value: BackpackBalances) -> Balances {
    Balances {
        assets: value
            .into_iter()
            .map(|(asset, balance)| (asset, balance.into()))
            .collect(),
    }
}

/// 0. 价格,
/// 1. 数量
pub type Level = (ByteString, ByteString);

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackpackDepth {
    pub asks: Vec<Level>,
    pub bids: Vec<Level>,
    #[serde(default)]
    pub last_update_id: ByteString,
}

impl TryFrom<BackpackDepth> for BookData {
    type Error = eyre::Report;

    fn try_from(value: BackpackDepth) -> Result<Self> {
        let parse_levels = |levels: &Vec<Level>| -> Result<Vec<(f64, f64)>> {
            levels
                .iter()
                .map(|(price_str, size_str)| {
                    let price = price_str
                        .parse::<f64>()
                        .wrap_err_with(|| format!("Failed to parse book price: '{price_str}'"))?;
                    let size = size_str
                        .parse::<f64>()
                        .wrap_err_with(|| format!("Failed to parse book size: '{size_str}'"))?;
                    Ok((price, size))
                })
                .collect()
        };

        let bids = parse_levels(&value.bids).wrap_err("Failed to parse bids")?;
        let asks = parse_levels(&value.asks).wrap_err("Failed to parse asks")?;

        Ok(Self {
            bids,
            asks,
            last_update_id: value.last_update_id,
        })
    }
}

/// 查单、下单、撤单与历史订单共用的订单结构
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackpackOrder {
    pub id: ByteString,
    pub client_id: Option<u32>,
    pub symbol: ByteString,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Option<ByteString>,
    pub quantity: Option<ByteString>,
    pub status: OrderStatus,
}

impl TryFrom<BackpackOrder> for Order {
    type Error = eyre::Report;

    fn try_from(value: BackpackOrder) -> Result<Self> {
        let parse_decimal = |field: &str, raw: Option<ByteString>| -> Result<Option<f64>> {
            raw.filter(|raw| !raw.is_empty())
                .map(|raw| {
                    raw.parse::<f64>()
                        .wrap_err_with(|| format!("Failed to parse order {field}: '{raw}'"))
                })
                .transpose()
        };

        let price = parse_decimal("price", value.price)?;
        let quantity = parse_decimal("quantity", value.quantity)?;

        Ok(Self {
            id: value.id,
            client_id: value.client_id,
            symbol: value.symbol,
            side: value.side,
            order_type: value.order_type,
            price,
            quantity,
            status: value.status,
        })
    }
}
