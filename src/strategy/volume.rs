use crate::{
    client::{DataGetter, OrderHistoryQuery},
    order::Order,
};
use eyre::Result;

pub const DEFAULT_PAGE_SIZE: u64 = 1000;

/// 统计历史订单中完全成交订单的成交额。
///
/// 每次都从第一页重新汇总，不做增量累加，同一笔订单无论查询多少次都只计一次。
#[derive(Debug, Clone, Copy)]
pub struct VolumeAccumulator {
    page_size: u64,
}

impl Default for VolumeAccumulator {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl VolumeAccumulator {
    pub fn new(page_size: u64) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    /// 从 offset 0 开始翻页，直到某页的条数少于 `page_size`。
    /// 最后一页恰好满页时会再请求一次，拿到空页才结束。
    pub async fn total<E>(&self, exchange: &mut E) -> Result<f64>
    where
        E: DataGetter<OrderHistoryQuery>,
    {
        let mut total = 0.0;
        let mut offset = 0;

        loop {
            let page = exchange
                .get_data(OrderHistoryQuery {
                    offset,
                    limit: self.page_size,
                })
                .await?;

            total += filled_notional(&page.orders);

            if (page.fetched as u64) < self.page_size {
                return Ok(total);
            }
            offset += self.page_size;
        }
    }
}

/// 完全成交订单的 `price × quantity` 之和，部分成交、撤单等都不计入
pub fn filled_notional(orders: &[Order]) -> f64 {
    orders.iter().filter_map(Order::filled_notional).sum()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        client::OrderHistoryPage,
        order::{OrderStatus, OrderType, Side},
    };
    use eyre::bail;

    fn order(id: u32, price: f64, quantity: f64, status: OrderStatus) -> Order {
        Order {
            id: id.to_string().into(),
            client_id: Some(id),
            symbol: "SOL_USDC".into(),
            side: Side::Bid,
            order_type: OrderType::Limit,
            price: Some(price),
            quantity: Some(quantity),
            status,
        }
    }

    #[derive(Default)]
    struct History {
        orders: Vec<Order>,
        requests: Vec<OrderHistoryQuery>,
        fail: bool,
    }

    impl DataGetter<OrderHistoryQuery> for History {
        async fn get_data(&mut self, params: OrderHistoryQuery) -> Result<OrderHistoryPage> {
            self.requests.push(params);
            if self.fail {
                bail!("history unavailable");
            }

            let orders: Vec<Order> = self
                .orders
                .iter()
                .skip(params.offset as usize)
                .take(params.limit as usize)
                .cloned()
                .collect();

            Ok(OrderHistoryPage {
                fetched: orders.len(),
                orders,
            })
        }
    }

    #[tokio::test]
    async fn sums_filled_orders_across_pages() {
        let mut history = History {
            orders: vec![
                order(1, 10.0, 1.0, OrderStatus::Filled),
                order(2, 20.0, 2.0, OrderStatus::Cancelled),
                order(3, 5.0, 4.0, OrderStatus::Filled),
                order(4, 1.0, 1.0, OrderStatus::PartiallyFilled),
                order(5, 2.5, 2.0, OrderStatus::Filled),
            ],
            ..Default::default()
        };

        let total = VolumeAccumulator::new(2).total(&mut history).await.unwrap();

        assert_eq!(total, 10.0 + 20.0 + 5.0);
        let offsets: Vec<u64> = history.requests.iter().map(|q| q.offset).collect();
        assert_eq!(offsets, vec![0, 2, 4]);
    }

    #[tokio::test]
    async fn exactly_full_last_page_fetches_one_more() {
        let mut history = History {
            orders: (1..=4)
                .map(|id| order(id, 1.0, 1.0, OrderStatus::Filled))
                .collect(),
            ..Default::default()
        };

        let total = VolumeAccumulator::new(2).total(&mut history).await.unwrap();

        assert_eq!(total, 4.0);
        let offsets: Vec<u64> = history.requests.iter().map(|q| q.offset).collect();
        assert_eq!(offsets, vec![0, 2, 4]);
    }

    #[tokio::test]
    async fn recomputation_does_not_double_count() {
        let mut history = History {
            orders: vec![order(1, 10.0, 3.0, OrderStatus::Filled)],
            ..Default::default()
        };
        let accumulator = VolumeAccumulator::default();

        let first = accumulator.total(&mut history).await.unwrap();
        let second = accumulator.total(&mut history).await.unwrap();

        assert_eq!(first, 30.0);
        assert_eq!(second, 30.0);
    }

    #[tokio::test]
    async fn empty_history_is_zero() {
        let mut history = History::default();

        let total = VolumeAccumulator::default().total(&mut history).await.unwrap();

        assert_eq!(total, 0.0);
        assert_eq!(history.requests.len(), 1);
        assert_eq!(history.requests[0].limit, DEFAULT_PAGE_SIZE);
    }

    #[tokio::test]
    async fn page_failure_is_propagated() {
        let mut history = History {
            fail: true,
            ..Default::default()
        };

        assert!(VolumeAccumulator::default().total(&mut history).await.is_err());
    }
}
