use crate::finite;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keiho_core::account::port::AccountStore;
use keiho_core::market::entity::PriceSnapshot;
use keiho_core::market::error::MarketError;
use keiho_core::market::port::PriceSource;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// # Summary
/// 券商报价接口的价格源实现。
///
/// # Invariants
/// - 每次抓取都从 `AccountStore` 读取该用户当前生效的访问令牌，
///   令牌刷新由外部 OAuth 流程负责。
/// - 凭证缺失、401、403 统一映射为 `MarketError::Credential`，
///   调用方据此切换到下一个候选用户。
pub struct BrokerProvider {
    client: Client,
    // 形如 https://api.tradier.com，不带结尾斜杠
    base_url: String,
    accounts: Arc<dyn AccountStore>,
}

impl BrokerProvider {
    /// # Summary
    /// 创建券商价格源。
    ///
    /// # Arguments
    /// * `base_url`: 接口根地址。
    /// * `accounts`: 凭证来源。
    /// * `timeout`: 单次请求超时。
    ///
    /// # Returns
    /// 客户端构建失败时返回 `MarketError::Unknown`。
    pub fn new(
        base_url: &str,
        accounts: Arc<dyn AccountStore>,
        timeout: Duration,
    ) -> Result<Self, MarketError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MarketError::Unknown(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            accounts,
        })
    }
}

#[derive(Deserialize, Debug)]
struct QuotesEnvelope {
    quotes: Option<QuotesBody>,
}

#[derive(Deserialize, Debug)]
struct QuotesBody {
    quote: Option<OneOrMany>,
}

/// 单个标的时接口返回对象，多个标的时返回数组
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum OneOrMany {
    One(BrokerQuote),
    Many(Vec<BrokerQuote>),
}

#[derive(Deserialize, Debug)]
struct BrokerQuote {
    last: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
}

/// # Summary
/// 把报价接口的响应体解析为价格快照。
///
/// # Logic
/// 1. 反序列化 `quotes.quote`，兼容对象与数组两种形态。
/// 2. 缺少 `quote`（未匹配的标的）返回 `NotFound`。
/// 3. `last` 缺失或非有限值返回 `Parse`；盘前 `high/low` 为 null 时回落到 `last`。
///
/// # Arguments
/// * `body`: 原始响应文本。
/// * `ticker`: 标的代码。
/// * `user_id`: 本次使用的凭证所属用户。
/// * `fetched_at`: 抓取时刻。
///
/// # Returns
/// 成功返回 `PriceSnapshot`。
pub fn parse_quotes(
    body: &str,
    ticker: &str,
    user_id: &str,
    fetched_at: DateTime<Utc>,
) -> Result<PriceSnapshot, MarketError> {
    let envelope: QuotesEnvelope =
        serde_json::from_str(body).map_err(|e| MarketError::Parse(e.to_string()))?;

    let quote = match envelope.quotes.and_then(|q| q.quote) {
        Some(OneOrMany::One(q)) => q,
        Some(OneOrMany::Many(list)) => list.into_iter().next().ok_or(MarketError::NotFound)?,
        None => return Err(MarketError::NotFound),
    };

    let last = finite(quote.last)
        .ok_or_else(|| MarketError::Parse(format!("{}: last price missing", ticker)))?;

    Ok(PriceSnapshot {
        ticker: ticker.to_string(),
        user_id: user_id.to_string(),
        last,
        high: finite(quote.high).unwrap_or(last),
        low: finite(quote.low).unwrap_or(last),
        fetched_at,
    })
}

#[async_trait]
impl PriceSource for BrokerProvider {
    /// # Summary
    /// 以指定用户的凭证抓取报价。
    ///
    /// # Logic
    /// 1. 读取用户凭证，不存在则返回 `Credential`。
    /// 2. 携带 Bearer 令牌请求 `/v1/markets/quotes`。
    /// 3. 按状态码分类错误，成功则交由 `parse_quotes` 解析。
    async fn fetch(&self, ticker: &str, user_id: &str) -> Result<PriceSnapshot, MarketError> {
        let credential = self
            .accounts
            .credential(user_id)
            .await
            .map_err(|e| MarketError::Unknown(format!("credential lookup failed: {}", e)))?
            .ok_or_else(|| MarketError::Credential(format!("no broker credential for {}", user_id)))?;

        let url = format!("{}/v1/markets/quotes", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("symbols", ticker)])
            .bearer_auth(&credential.access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| MarketError::Network(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(MarketError::Credential(format!(
                "HTTP {} for {}",
                status, user_id
            )));
        }
        if !status.is_success() {
            return Err(MarketError::Network(format!("HTTP {}", status)));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| MarketError::Network(e.to_string()))?;
        debug!(ticker, user_id, "Broker quote received");

        parse_quotes(&body, ticker, user_id, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_quote_object() {
        let body = r#"{"quotes":{"quote":{"symbol":"MNQ","last":12345.5,"high":12400.0,"low":12300.25}}}"#;
        let snap = parse_quotes(body, "MNQ", "u1", Utc::now()).unwrap();
        assert_eq!(snap.last, 12345.5);
        assert_eq!(snap.high, 12400.0);
        assert_eq!(snap.low, 12300.25);
    }

    #[test]
    fn test_parse_quote_array_and_null_range() {
        let body = r#"{"quotes":{"quote":[{"symbol":"SPY","last":501.2,"high":null,"low":null}]}}"#;
        let snap = parse_quotes(body, "SPY", "u1", Utc::now()).unwrap();
        assert_eq!(snap.high, 501.2);
        assert_eq!(snap.low, 501.2);
    }

    #[test]
    fn test_parse_null_last_is_parse_error() {
        let body = r#"{"quotes":{"quote":{"symbol":"SPY","last":null}}}"#;
        assert!(matches!(
            parse_quotes(body, "SPY", "u1", Utc::now()),
            Err(MarketError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_unmatched_symbol_is_not_found() {
        let body = r#"{"quotes":{"unmatched_symbols":{"symbol":"NOPE"}}}"#;
        assert!(matches!(
            parse_quotes(body, "NOPE", "u1", Utc::now()),
            Err(MarketError::NotFound)
        ));
        assert!(matches!(
            parse_quotes("not json", "NOPE", "u1", Utc::now()),
            Err(MarketError::Parse(_))
        ));
    }
}
