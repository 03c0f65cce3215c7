use crate::{
    data::{Balances, PriceQuote},
    order::{Order, Side},
};
use eyre::Result;
use std::future::Future;

pub mod backpack;

// 通常你需要为每个请求实现该trait，`Data` 是标准化后的结果
pub trait RawData {
    type Data;
}

pub trait DataGetter<R: RawData> {
    fn get_data(&mut self, params: R) -> impl Future<Output = Result<R::Data>> + Send;
}

/// 策略需要的全部交易所能力
pub trait Exchange:
    DataGetter<BalanceQuery>
    + DataGetter<OrderQuery>
    + DataGetter<CancelAllOrders>
    + DataGetter<DepthQuery>
    + DataGetter<PlaceOrder>
    + DataGetter<OrderHistoryQuery>
{
}

impl<T> Exchange for T where
    T: DataGetter<BalanceQuery>
        + DataGetter<OrderQuery>
        + DataGetter<CancelAllOrders>
        + DataGetter<DepthQuery>
        + DataGetter<PlaceOrder>
        + DataGetter<OrderHistoryQuery>
{
}

/// 查询账户余额
#[derive(Debug, Clone, Copy, Default)]
pub struct BalanceQuery;

impl RawData for BalanceQuery {
    type Data = Balances;
}

/// 按本地订单ID查询挂单。订单不存在（已成交或从未挂出）时返回 `None`。
#[derive(Debug, Clone, Copy)]
pub struct OrderQuery {
    pub client_id: u32,
}

impl RawData for OrderQuery {
    type Data = Option<Order>;
}

/// 撤销交易对上的全部挂单，返回被撤销的订单
#[derive(Debug, Clone, Copy, Default)]
pub struct CancelAllOrders;

impl RawData for CancelAllOrders {
    type Data = Vec<Order>;
}

/// 公共行情，无需签名
#[derive(Debug, Clone, Copy, Default)]
pub struct DepthQuery;

impl RawData for DepthQuery {
    type Data = PriceQuote;
}

/// 下单。价格和数量在提交前已经对齐精度。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaceOrder {
    pub client_id: u32,
    pub side: Side,
    pub price: f64,
    pub quantity: f64,
    /// 只做 maker，会立即成交时被交易所拒绝
    pub post_only: bool,
}

impl RawData for PlaceOrder {
    type Data = Order;
}

/// 分页查询历史订单
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderHistoryQuery {
    pub offset: u64,
    pub limit: u64,
}

impl RawData for OrderHistoryQuery {
    type Data = OrderHistoryPage;
}

#[derive(Debug, Clone, Default)]
pub struct OrderHistoryPage {
    /// 交易所返回的记录条数，用于判断是否还有下一页
    pub fetched: usize,
    /// 能够解析的订单
    pub orders: Vec<Order>,
}
