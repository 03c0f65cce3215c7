pub mod model;
pub mod sign;

use crate::{
    Symbol, Timestamp,
    client::{
        BalanceQuery, CancelAllOrders, DataGetter, DepthQuery, OrderHistoryPage,
        OrderHistoryQuery, OrderQuery, PlaceOrder, RawData,
    },
    data::{BookData, PriceQuote},
    order::Order,
};
use chrono::Utc;
use eyre::{Context, Result, bail};
use model::*;
use reqwest::{Client, Method, StatusCode, header::CONTENT_TYPE};
use serde::de::DeserializeOwned;
use sign::{Credentials, Params};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.backpack.exchange/";
/// 签名有效期（毫秒）
pub const DEFAULT_WINDOW: u64 = 5000;
/// 单个请求从发出到读完响应体的上限
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const HEADER_API_KEY: &str = "X-API-Key";
const HEADER_SIGNATURE: &str = "X-Signature";
const HEADER_TIMESTAMP: &str = "X-Timestamp";
const HEADER_WINDOW: &str = "X-Window";

pub struct BackpackClient {
    api_url: Url,
    wapi_url: Url,

    client: Client,
    credentials: Credentials,
    symbol: Symbol,
    window: u64,
}

#[bon::bon]
impl BackpackClient {
    #[builder]
    pub fn new(
        credentials: Credentials,
        #[builder(into)] symbol: Symbol,
        #[builder(default = DEFAULT_BASE_URL)] base_url: &str,
        #[builder(default = DEFAULT_WINDOW)] window: u64,
        #[builder(default = DEFAULT_TIMEOUT)] timeout: Duration,
    ) -> Result<Self> {
        // Url::join 只有在 base 以 '/' 结尾时才会保留最后一段路径
        let base_url = if base_url.ends_with('/') {
            base_url.parse::<Url>()?
        } else {
            format!("{base_url}/").parse::<Url>()?
        };

        Ok(BackpackClient {
            api_url: base_url.join("api/v1/")?,
            wapi_url: base_url.join("wapi/v1/")?,
            client: Client::builder().timeout(timeout).build()?,
            credentials,
            symbol,
            window,
        })
    }

    /// 发送请求，返回状态码和原始响应体，不重试也不解析。
    ///
    /// GET/DELETE 的参数写入查询字符串，非 GET 请求同时以 JSON 请求体提交。
    /// `instruction` 为 `None` 时是公共接口，不签名也不带鉴权头。
    pub async fn execute(
        &self,
        method: Method,
        mut url: Url,
        instruction: Option<&str>,
        params: &Params,
    ) -> Result<(StatusCode, Vec<u8>)> {
        if matches!(method, Method::GET | Method::DELETE) && !params.is_empty() {
            let mut query = url.query_pairs_mut();
            for (key, value) in params.iter() {
                query.append_pair(key, &value.to_string());
            }
        }

        let mut request = self
            .client
            .request(method.clone(), url)
            .header(CONTENT_TYPE, "application/json; charset=utf-8");

        if method != Method::GET {
            request = request.body(simd_json::serde::to_string(params)?);
        }

        if let Some(instruction) = instruction {
            let timestamp: Timestamp = Utc::now().timestamp_millis();
            let signature =
                self.credentials
                    .sign_request(instruction, params, timestamp, self.window);

            request = request
                .header(HEADER_API_KEY, self.credentials.api_key())
                .header(HEADER_SIGNATURE, signature)
                .header(HEADER_TIMESTAMP, itoa::Buffer::new().format(timestamp))
                .header(HEADER_WINDOW, itoa::Buffer::new().format(self.window));
        }

        let resp = request.send().await?;
        let status = resp.status();
        let body = resp.bytes().await?.to_vec();
        debug!(%method, %status, instruction, "backpack response");

        Ok((status, body))
    }

    fn api(&self, path: &str) -> Result<Url> {
        Ok(self.api_url.join(path)?)
    }
}

fn decode<T: DeserializeOwned>(what: &str, status: StatusCode, mut body: Vec<u8>) -> Result<T> {
    if status != StatusCode::OK {
        bail!(
            "{what} failed with status {status}: {}",
            String::from_utf8_lossy(&body)
        );
    }

    simd_json::serde::from_slice::<T>(&mut body)
        .wrap_err_with(|| format!("Failed to decode {what} response"))
}

impl DataGetter<BalanceQuery> for BackpackClient {
    async fn get_data(
        &mut self,
        _params: BalanceQuery,
    ) -> Result<<BalanceQuery as RawData>::Data> {
        let (status, body) = self
            .execute(
                Method::GET,
                self.api("capital")?,
                Some("balanceQuery"),
                &Params::new(),
            )
            .await?;

        let raw: BackpackBalances = decode("balanceQuery", status, body)?;
        Ok(into_balances(raw))
    }
}

impl DataGetter<OrderQuery> for BackpackClient {
    async fn get_data(&mut self, params: OrderQuery) -> Result<<OrderQuery as RawData>::Data> {
        let query = Params::new()
            .with("symbol", self.symbol.clone())
            .with("clientId", params.client_id);

        let (status, body) = self
            .execute(Method::GET, self.api("order")?, Some("orderQuery"), &query)
            .await?;

        // 404 表示没有挂单，是正常结果
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let raw: BackpackOrder = decode("orderQuery", status, body)?;
        Ok(Some(Order::try_from(raw)?))
    }
}

impl DataGetter<CancelAllOrders> for BackpackClient {
    async fn get_data(
        &mut self,
        _params: CancelAllOrders,
    ) -> Result<<CancelAllOrders as RawData>::Data> {
        let params = Params::new().with("symbol", self.symbol.clone());

        let (status, body) = self
            .execute(
                Method::DELETE,
                self.api("orders")?,
                Some("orderCancelAll"),
                &params,
            )
            .await?;

        let raw: Vec<BackpackOrder> = decode("orderCancelAll", status, body)?;
        raw.into_iter().map(Order::try_from).collect()
    }
}

impl DataGetter<DepthQuery> for BackpackClient {
    async fn get_data(&mut self, _params: DepthQuery) -> Result<<DepthQuery as RawData>::Data> {
        let params = Params::new().with("symbol", self.symbol.clone());

        let (status, body) = self
            .execute(Method::GET, self.api("depth")?, None, &params)
            .await?;

        let raw: BackpackDepth = decode("depth", status, body)?;
        let book = BookData::try_from(raw)?;
        Ok(PriceQuote::from_book(&book))
    }
}

impl DataGetter<PlaceOrder> for BackpackClient {
    async fn get_data(&mut self, params: PlaceOrder) -> Result<<PlaceOrder as RawData>::Data> {
        let PlaceOrder {
            client_id,
            side,
            price,
            quantity,
            post_only,
        } = params;

        // 市价模式也以不挂 maker 的限价单提交，价格已经穿过盘口
        let body = Params::new()
            .with("clientId", client_id)
            .with("orderType", "Limit")
            .with("postOnly", post_only)
            .with("price", price)
            .with("quantity", quantity)
            .with("selfTradePrevention", "Allow")
            .with("side", <&'static str>::from(side))
            .with("symbol", self.symbol.clone())
            .with("timeInForce", "GTC");

        let (status, resp) = self
            .execute(Method::POST, self.api("order")?, Some("orderExecute"), &body)
            .await?;

        let raw: BackpackOrder = decode("orderExecute", status, resp)?;
        Order::try_from(raw)
    }
}

impl DataGetter<OrderHistoryQuery> for BackpackClient {
    async fn get_data(
        &mut self,
        params: OrderHistoryQuery,
    ) -> Result<<OrderHistoryQuery as RawData>::Data> {
        let query = Params::new()
            .with("symbol", self.symbol.clone())
            .with("offset", params.offset as i64)
            .with("limit", params.limit as i64);

        let url = self.wapi_url.join("history/orders")?;
        let (status, body) = self
            .execute(Method::GET, url, Some("orderHistoryQueryAll"), &query)
            .await?;

        let raw: Vec<BackpackOrder> = decode("orderHistoryQueryAll", status, body)?;
        let fetched = raw.len();
        let orders = raw
            .into_iter()
            .filter_map(|raw| {
                let id = raw.id.clone();
                Order::try_from(raw)
                    .inspect_err(|e| warn!(%id, "skip malformed history order: {e:#}"))
                    .ok()
            })
            .collect();

        Ok(OrderHistoryPage { fetched, orders })
    }
}
