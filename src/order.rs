use bytestring::ByteString;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

/// 交易方向，与交易所的字段值一致
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumString,
    IntoStaticStr,
)]
pub enum Side {
    /// 买
    Bid,
    /// 卖
    Ask,
}

/// 订单类型
///
/// 配置中的 `order_type` 也使用该类型，只接受 `Limit` 和 `Market`。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumString,
)]
pub enum OrderType {
    Limit,
    Market,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Display)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    TriggerPending,
    Filled,
    Cancelled,
    Expired,
    TriggerFailed,
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    /// 订单是否仍挂在盘口上
    pub fn is_open(self) -> bool {
        matches!(
            self,
            OrderStatus::New | OrderStatus::PartiallyFilled | OrderStatus::TriggerPending
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    /// 交易所分配的订单ID
    pub id: ByteString,
    /// 本地分配的订单ID，从 1 开始递增
    pub client_id: Option<u32>,
    pub symbol: ByteString,
    pub side: Side,
    pub order_type: OrderType,
    /// 市价单可能没有价格
    pub price: Option<f64>,
    pub quantity: Option<f64>,
    pub status: OrderStatus,
}

impl Order {
    /// 成交额，只统计完全成交的订单
    pub fn filled_notional(&self) -> Option<f64> {
        if self.status != OrderStatus::Filled {
            return None;
        }

        Some(self.price? * self.quantity?)
    }
}
