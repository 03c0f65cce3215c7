//! 刷量策略
//!
//! 每一轮：
//! 1. 检查下单次数是否用完
//! 2. 轮询上一笔订单，随机次数后仍未成交则全部撤单
//! 3. 重新汇总成交额，达到目标则结束
//! 4. 获取盘口与余额，余额不足则结束
//! 5. 选择方向下单，随机等待后进入下一轮

pub mod volume;

use crate::{
    client::{
        BalanceQuery, CancelAllOrders, DataGetter, DepthQuery, Exchange, OrderQuery, PlaceOrder,
        RawData,
    },
    clock::{Sleeper, Wake},
    data::{PriceQuote, floor_to},
    order::{OrderType, Side},
};
use bon::Builder;
use bytestring::ByteString;
use eyre::Result;
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::{ops::ControlFlow, time::Duration};
use strum::Display;
use tracing::{debug, info, warn};
use volume::VolumeAccumulator;

/// 市价模式买入时相对卖一价的溢价
pub const BUY_PREMIUM: f64 = 1.02;
/// 卖单相对买一价的折价
pub const SELL_DISCOUNT: f64 = 0.999;
/// 轮询挂单的间隔
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
/// 价格与数量保留的小数位
pub const PRICE_DECIMALS: u32 = 2;

/// 三个结束条件，外加被外部中断
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Termination {
    /// 下单次数用完
    CountExhausted,
    /// 成交额达到目标
    VolumeExhausted,
    /// 两边余额都低于最小下单额
    BalanceExhausted,
    /// 等待期间收到停止信号
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Builder)]
pub struct TerminationConfig {
    /// 最多下单次数，0 表示不限
    #[builder(default)]
    pub max_cycles: u64,
    /// 目标成交额（计价币），0 表示不限
    #[builder(default)]
    pub max_volume: f64,
    /// 每轮轮询挂单次数的上限，实际次数在 [0, max_poll_attempts) 中随机
    #[builder(default = 10)]
    pub max_poll_attempts: u32,
    /// 每轮结束后最多等待的秒数
    #[builder(default = 1)]
    pub max_wait_secs: u64,
}

impl Default for TerminationConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Clone, PartialEq, Builder)]
pub struct StrategyConfig {
    #[builder(into)]
    pub base_asset: ByteString,
    #[builder(into)]
    pub quote_asset: ByteString,
    #[builder(default = OrderType::Limit)]
    pub order_type: OrderType,
    #[builder(default)]
    pub termination: TerminationConfig,
    /// 低于该价值（计价币）的余额视为不可用
    #[builder(default = 1.0)]
    pub min_notional: f64,
    /// 用于估算手续费磨损
    #[builder(default = 0.00085)]
    pub fee_rate: f64,
    #[builder(default = volume::DEFAULT_PAGE_SIZE)]
    pub history_page_size: u64,
}

/// 策略运行期间的状态，只由策略自身修改
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyState {
    /// 上一笔订单是否为买单
    pub last_order_is_bid: bool,
    /// 上一笔订单的本地ID，即已经下单的次数
    pub last_order_client_id: u32,
    /// 上一笔订单的交易所ID，下单失败时为空
    pub last_order_id: Option<ByteString>,
    pub cumulative_filled_volume: f64,
}

/// 本轮的行情与余额快照
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Market {
    pub quote: PriceQuote,
    pub base_balance: f64,
    pub quote_balance: f64,
}

/// 提交前的订单参数，价格与数量都已向下取整
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderPlan {
    pub side: Side,
    pub price: f64,
    pub quantity: f64,
    pub post_only: bool,
}

impl OrderPlan {
    /// 买单：市价模式以卖一价加溢价成交，限价模式以买一价挂 post-only，用完全部计价币。
    ///
    /// 卖单：无论配置哪种模式，都以买一价折价立即卖出全部基础币，不持有波动资产。
    pub fn new(side: Side, order_type: OrderType, market: &Market) -> Self {
        match side {
            Side::Bid => {
                let price = match order_type {
                    OrderType::Market => market.quote.ask * BUY_PREMIUM,
                    OrderType::Limit => market.quote.bid,
                };
                let quantity = market.quote_balance / price;

                Self {
                    side,
                    price: floor_to(price, PRICE_DECIMALS),
                    quantity: floor_to(quantity, PRICE_DECIMALS),
                    post_only: order_type == OrderType::Limit,
                }
            }
            Side::Ask => Self {
                side,
                price: floor_to(market.quote.bid * SELL_DISCOUNT, PRICE_DECIMALS),
                quantity: floor_to(market.base_balance, PRICE_DECIMALS),
                post_only: false,
            },
        }
    }
}

/// 一轮提前结束的原因
enum Stop {
    /// 本轮没有可用结果，不下单直接进入下一轮
    Skip,
    Terminate(Termination),
}

pub struct Strategy<E, S> {
    exchange: E,
    sleeper: S,
    config: StrategyConfig,
    volume: VolumeAccumulator,
    rng: StdRng,
    state: StrategyState,
}

#[bon::bon]
impl<E: Exchange, S: Sleeper> Strategy<E, S> {
    #[builder]
    pub fn new(
        exchange: E,
        sleeper: S,
        config: StrategyConfig,
        #[builder(default = StdRng::from_os_rng())] rng: StdRng,
    ) -> Self {
        Self {
            exchange,
            sleeper,
            volume: VolumeAccumulator::new(config.history_page_size),
            config,
            rng,
            state: StrategyState::default(),
        }
    }

    pub fn state(&self) -> &StrategyState {
        &self.state
    }

    pub fn exchange(&self) -> &E {
        &self.exchange
    }

    /// 运行到任意结束条件满足为止。结束后不再发出任何请求。
    pub async fn run(&mut self) -> Termination {
        loop {
            match self.cycle().await {
                ControlFlow::Continue(()) | ControlFlow::Break(Stop::Skip) => {}
                ControlFlow::Break(Stop::Terminate(termination)) => {
                    info!(
                        %termination,
                        orders = self.state.last_order_client_id,
                        volume = self.state.cumulative_filled_volume,
                        "策略结束"
                    );
                    return termination;
                }
            }
        }
    }

    async fn cycle(&mut self) -> ControlFlow<Stop> {
        if self.sleeper.is_cancelled() {
            return ControlFlow::Break(Stop::Terminate(Termination::Interrupted));
        }
        self.check_count()?;
        info!(cycle = self.state.last_order_client_id + 1, "交易开始");

        // 下单请求失败时订单仍可能已被交易所接受，所以只要下过单就按本地ID轮询
        if self.state.last_order_client_id > 0 {
            self.poll_open_order().await?;
        }

        self.check_volume().await?;
        let market = self.fetch_market().await?;
        self.check_balance(&market)?;

        let side = self.choose_side(&market);
        self.place_order(side, &market).await;

        self.wait().await
    }

    fn check_count(&self) -> ControlFlow<Stop> {
        let max_cycles = self.config.termination.max_cycles;
        if max_cycles > 0 && u64::from(self.state.last_order_client_id) >= max_cycles {
            return ControlFlow::Break(Stop::Terminate(Termination::CountExhausted));
        }

        ControlFlow::Continue(())
    }

    /// 查询失败时按仍有挂单处理，保证新订单提交前旧订单已成交或被撤销
    async fn poll_open_order(&mut self) -> ControlFlow<Stop> {
        let client_id = self.state.last_order_client_id;
        let upper = self.config.termination.max_poll_attempts;
        let max_attempts = if upper == 0 {
            0
        } else {
            self.rng.random_range(0..upper)
        };
        debug!(client_id, max_attempts, "轮询未成交订单");

        let mut attempts = 0;
        loop {
            let open = match self.request(OrderQuery { client_id }).await {
                Ok(Some(order)) => order.status.is_open(),
                Ok(None) => false,
                Err(e) => {
                    warn!(client_id, "查询订单失败: {e:#}");
                    true
                }
            };
            if !open {
                return ControlFlow::Continue(());
            }

            self.sleep(POLL_INTERVAL).await?;
            attempts += 1;

            if attempts >= max_attempts {
                match self.request(CancelAllOrders).await {
                    Ok(cancelled) => info!(client_id, count = cancelled.len(), "取消未成交的订单"),
                    Err(e) => warn!(client_id, "取消订单失败: {e:#}"),
                }
                return ControlFlow::Continue(());
            }
        }
    }

    async fn check_volume(&mut self) -> ControlFlow<Stop> {
        let total = match self.volume.total(&mut self.exchange).await {
            Ok(total) => total,
            Err(e) => {
                warn!("汇总成交额失败: {e:#}");
                return ControlFlow::Break(Stop::Skip);
            }
        };
        self.state.cumulative_filled_volume = total;
        info!(
            volume = total,
            fee = total * self.config.fee_rate,
            "已完成交易量"
        );

        let max_volume = self.config.termination.max_volume;
        if max_volume > 0.0 && total >= max_volume {
            return ControlFlow::Break(Stop::Terminate(Termination::VolumeExhausted));
        }

        ControlFlow::Continue(())
    }

    async fn fetch_market(&mut self) -> ControlFlow<Stop, Market> {
        let quote = match self.request(DepthQuery).await {
            Ok(quote) if quote.is_usable() => quote,
            Ok(quote) => {
                warn!(bid = quote.bid, ask = quote.ask, "盘口价格不可用");
                return ControlFlow::Break(Stop::Skip);
            }
            Err(e) => {
                warn!("获取价格失败: {e:#}");
                return ControlFlow::Break(Stop::Skip);
            }
        };

        let balances = match self.request(BalanceQuery).await {
            Ok(balances) => balances,
            Err(e) => {
                warn!("获取余额失败: {e:#}");
                return ControlFlow::Break(Stop::Skip);
            }
        };

        let market = Market {
            quote,
            base_balance: balances.available(&self.config.base_asset),
            quote_balance: balances.available(&self.config.quote_asset),
        };
        info!(
            bid = quote.bid,
            ask = quote.ask,
            base = market.base_balance,
            quote = market.quote_balance,
            "当前行情与余额"
        );

        ControlFlow::Continue(market)
    }

    fn check_balance(&self, market: &Market) -> ControlFlow<Stop> {
        if !self.base_usable(market) && !self.quote_usable(market) {
            return ControlFlow::Break(Stop::Terminate(Termination::BalanceExhausted));
        }

        ControlFlow::Continue(())
    }

    /// 两边都可用时随机，否则只能用有余额的一边。
    ///
    /// 不参考 `last_order_is_bid`：买入后计价币耗尽、卖出后基础币耗尽，买卖交替由余额自然形成。
    fn choose_side(&mut self, market: &Market) -> Side {
        match (self.base_usable(market), self.quote_usable(market)) {
            (true, true) => {
                if self.rng.random_bool(0.5) {
                    Side::Bid
                } else {
                    Side::Ask
                }
            }
            (true, false) => Side::Ask,
            (false, _) => Side::Bid,
        }
    }

    async fn place_order(&mut self, side: Side, market: &Market) {
        self.state.last_order_client_id += 1;
        let client_id = self.state.last_order_client_id;

        let plan = OrderPlan::new(side, self.config.order_type, market);
        info!(
            client_id,
            side = %plan.side,
            price = plan.price,
            quantity = plan.quantity,
            post_only = plan.post_only,
            "开单"
        );

        let params = PlaceOrder {
            client_id,
            side: plan.side,
            price: plan.price,
            quantity: plan.quantity,
            post_only: plan.post_only,
        };
        self.state.last_order_id = match self.request(params).await {
            Ok(order) => Some(order.id),
            Err(e) => {
                warn!(client_id, "下单失败: {e:#}");
                None
            }
        };
        self.state.last_order_is_bid = plan.side == Side::Bid;
    }

    /// 随机等待 [1, max_wait_secs] 秒
    async fn wait(&mut self) -> ControlFlow<Stop> {
        let max = self.config.termination.max_wait_secs.max(1);
        let secs = self.rng.random_range(1..=max);
        info!(secs, "随机等待");

        self.sleep(Duration::from_secs(secs)).await
    }

    async fn sleep(&self, duration: Duration) -> ControlFlow<Stop> {
        match self.sleeper.sleep(duration).await {
            Wake::Elapsed => ControlFlow::Continue(()),
            Wake::Cancelled => ControlFlow::Break(Stop::Terminate(Termination::Interrupted)),
        }
    }

    fn base_usable(&self, market: &Market) -> bool {
        market.base_balance * market.quote.ask > self.config.min_notional
    }

    fn quote_usable(&self, market: &Market) -> bool {
        market.quote_balance > self.config.min_notional
    }

    async fn request<R: RawData>(&mut self, params: R) -> Result<R::Data>
    where
        E: DataGetter<R>,
    {
        <E as DataGetter<R>>::get_data(&mut self.exchange, params).await
    }
}
