use crate::market::entity::PriceSnapshot;
use crate::market::error::MarketError;
use async_trait::async_trait;

/// # Summary
/// 价格源接口（外部协作方）。
///
/// # Invariants
/// - 失败是常态，必须以 `Err` 返回而不是 panic。
/// - 实现类必须保证线程安全 (`Send` + `Sync`)，同一轮内会被并发调用。
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// # Summary
    /// 以指定用户的凭证抓取标的最新快照。
    ///
    /// # Logic
    /// 1. 解析该用户的访问凭证（如需要）。
    /// 2. 请求上游行情接口并解析最新价、最高价、最低价。
    ///
    /// # Arguments
    /// * `ticker` - 标的代码。
    /// * `user_id` - 凭证所属用户。
    ///
    /// # Returns
    /// 成功返回 `PriceSnapshot`，失败返回 `MarketError`。
    async fn fetch(&self, ticker: &str, user_id: &str) -> Result<PriceSnapshot, MarketError>;
}
