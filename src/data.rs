use bytestring::ByteString;
use std::collections::HashMap;

/// 单个币种的余额
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AssetBalance {
    pub available: f64,
    pub locked: f64,
    pub staked: f64,
}

/// 账户余额快照。每次查询得到一个新值，不与旧值合并。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Balances {
    pub assets: HashMap<ByteString, AssetBalance>,
}

impl Balances {
    /// 可用余额，账户中没有该币种时为 0
    pub fn available(&self, asset: &str) -> f64 {
        self.assets
            .get(asset)
            .map(|balance| balance.available)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookData {
    /// (价格, 数量)
    pub bids: Vec<(f64, f64)>,
    /// (价格, 数量)
    pub asks: Vec<(f64, f64)>,
    pub last_update_id: ByteString,
}

/// 买一/卖一报价
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PriceQuote {
    pub bid: f64,
    pub bid_volume: f64,
    pub ask: f64,
    pub ask_volume: f64,
}

impl PriceQuote {
    /// 盘口不保证排序，按价格取最高买价和最低卖价。空的一侧为 0。
    pub fn from_book(book: &BookData) -> Self {
        let (bid, bid_volume) = book
            .bids
            .iter()
            .copied()
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .unwrap_or_default();
        let (ask, ask_volume) = book
            .asks
            .iter()
            .copied()
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .unwrap_or_default();

        Self {
            bid,
            bid_volume,
            ask,
            ask_volume,
        }
    }

    pub fn is_usable(&self) -> bool {
        self.bid.is_finite() && self.ask.is_finite() && self.bid > 0.0 && self.ask > 0.0
    }
}

/// 向下取整到 `decimals` 位小数，结果不会大于 `value` 对应的精度档位。
///
/// `0.29 * 100 = 28.999999999999996` 这类乘法误差只有几个 ulp，此时按已经对齐处理；
/// 超出这个范围的一律向下取整，`4.99999999999` 仍然得到 `4.99`。
pub fn floor_to(value: f64, decimals: u32) -> f64 {
    let factor = 10_f64.powi(decimals as i32);
    let scaled = value * factor;
    let nearest = scaled.round();

    if (scaled - nearest).abs() <= scaled.abs() * 4.0 * f64::EPSILON {
        nearest / factor
    } else {
        scaled.floor() / factor
    }
}
