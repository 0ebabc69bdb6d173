use crate::finite;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keiho_core::market::entity::PriceSnapshot;
use keiho_core::market::error::MarketError;
use keiho_core::market::port::PriceSource;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// # Summary
/// Yahoo Finance 价格源实现。
///
/// # Invariants
/// - 使用 `reqwest` 异步客户端进行通讯。
/// - 公共接口无需凭证，`user_id` 只原样写入快照。
#[derive(Clone)]
pub struct YahooProvider {
    /// 内部使用的 HTTP 客户端
    client: Client,
}

impl YahooProvider {
    /// # Summary
    /// 创建一个新的 YahooProvider 实例。
    ///
    /// # Logic
    /// 1. 按传入值配置请求超时。
    /// 2. 设置伪装浏览器 Header (User-Agent) 以减少被拦截风险。
    /// 3. 初始化 reqwest 客户端。
    ///
    /// # Arguments
    /// * `timeout`: 单次请求超时。
    ///
    /// # Returns
    /// 客户端构建失败时返回 `MarketError::Unknown`。
    pub fn new(timeout: Duration) -> Result<Self, MarketError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
            ),
        );

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| MarketError::Unknown(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

/// # Summary
/// Yahoo API 响应顶层结构。
///
/// # Invariants
/// - 映射自 Yahoo v8 chart 接口，只取 `meta` 部分。
#[derive(Deserialize, Debug)]
struct YahooResponse {
    chart: YahooChart,
}

#[derive(Deserialize, Debug)]
struct YahooChart {
    result: Option<Vec<YahooResult>>,
    error: Option<YahooError>,
}

#[derive(Deserialize, Debug)]
struct YahooError {
    description: String,
}

#[derive(Deserialize, Debug)]
struct YahooResult {
    meta: YahooMeta,
}

/// # Summary
/// 图表元数据中的实时行情字段。
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct YahooMeta {
    regular_market_price: Option<f64>,
    regular_market_day_high: Option<f64>,
    regular_market_day_low: Option<f64>,
}

/// # Summary
/// 把 chart 接口的响应体解析为价格快照。
///
/// # Logic
/// 1. 反序列化 JSON，`chart.error` 非空时返回 `Unknown`。
/// 2. 取第一条 result 的 `meta`，缺少结果返回 `NotFound`。
/// 3. `regularMarketPrice` 缺失或非有限值返回 `Parse`；日内高低价缺失时回落到最新价。
///
/// # Arguments
/// * `body`: 原始响应文本。
/// * `ticker`: 标的代码。
/// * `user_id`: 写入快照的用户标识。
/// * `fetched_at`: 抓取时刻。
///
/// # Returns
/// 成功返回 `PriceSnapshot`。
pub fn parse_chart(
    body: &str,
    ticker: &str,
    user_id: &str,
    fetched_at: DateTime<Utc>,
) -> Result<PriceSnapshot, MarketError> {
    let json: YahooResponse =
        serde_json::from_str(body).map_err(|e| MarketError::Parse(e.to_string()))?;

    if let Some(err) = json.chart.error {
        return Err(MarketError::Unknown(err.description));
    }

    let meta = json
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or(MarketError::NotFound)?
        .meta;

    let last = finite(meta.regular_market_price)
        .ok_or_else(|| MarketError::Parse(format!("{}: regularMarketPrice missing", ticker)))?;

    Ok(PriceSnapshot {
        ticker: ticker.to_string(),
        user_id: user_id.to_string(),
        last,
        high: finite(meta.regular_market_day_high).unwrap_or(last),
        low: finite(meta.regular_market_day_low).unwrap_or(last),
        fetched_at,
    })
}

#[async_trait]
impl PriceSource for YahooProvider {
    /// # Summary
    /// 从 Yahoo Finance 抓取标的当前价格。
    ///
    /// # Logic
    /// 1. 请求 1 日范围、1 分钟粒度的图表接口（只读取 meta）。
    /// 2. 非 2xx 状态码映射为网络错误。
    /// 3. 交由 `parse_chart` 解析。
    async fn fetch(&self, ticker: &str, user_id: &str) -> Result<PriceSnapshot, MarketError> {
        let url = format!("{}/{}", CHART_URL, ticker);

        let resp = self
            .client
            .get(&url)
            .query(&[("range", "1d"), ("interval", "1m")])
            .send()
            .await
            .map_err(|e| MarketError::Network(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(MarketError::NotFound);
        }
        if !status.is_success() {
            return Err(MarketError::Network(format!("HTTP {}", status)));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| MarketError::Network(e.to_string()))?;
        debug!(ticker, bytes = body.len(), "Yahoo chart response received");

        parse_chart(&body, ticker, user_id, Utc::now())
    }
}
