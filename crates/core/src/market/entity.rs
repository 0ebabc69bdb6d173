use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// # Summary
/// 某个标的的最新价格快照。
///
/// # Invariants
/// - 临时数据，每次轮询都会被替换，引擎从不持久化。
/// - `user_id` 记录本次抓取所使用的凭证身份。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    // 标的代码
    pub ticker: String,
    // 抓取所用凭证的所属用户
    pub user_id: String,
    // 最新成交价
    pub last: f64,
    // 当日最高价
    pub high: f64,
    // 当日最低价
    pub low: f64,
    // 抓取时刻
    pub fetched_at: DateTime<Utc>,
}

impl PriceSnapshot {
    /// # Summary
    /// 快照是否可用于评估。
    ///
    /// # Logic
    /// 最新价必须是有限正数；最高/最低价若非有限值同样视为畸形数据。
    pub fn is_usable(&self) -> bool {
        self.last.is_finite() && self.last > 0.0 && self.high.is_finite() && self.low.is_finite()
    }
}
