use crate::alert::entity::Direction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// # Summary
/// 通知投递状态，仅用于观测。
///
/// # Invariants
/// - 去重判定绝不读取该字段。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    // 尚未投递
    Pending,
    // 所有尝试的渠道均成功
    Delivered,
    // 部分渠道成功
    Partial,
    // 全部失败或没有可用渠道
    Failed,
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::Pending => write!(f, "pending"),
            DeliveryStatus::Delivered => write!(f, "delivered"),
            DeliveryStatus::Partial => write!(f, "partial"),
            DeliveryStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DeliveryStatus::Pending),
            "delivered" => Ok(DeliveryStatus::Delivered),
            "partial" => Ok(DeliveryStatus::Partial),
            "failed" => Ok(DeliveryStatus::Failed),
            _ => Err(format!("Unknown DeliveryStatus: {}", s)),
        }
    }
}

/// # Summary
/// 待写入的触发记录。
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerDraft {
    pub alert_id: String,
    pub ticker: String,
    // 触发价格
    pub price: f64,
    pub direction: Direction,
    // 触发时刻
    pub triggered_at: DateTime<Utc>,
}

/// # Summary
/// 已持久化的触发记录。
///
/// # Invariants
/// - 同一 `alert_id` 的任意两条记录，时间间隔不得小于该预警周期的最小间隔。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerRecord {
    pub id: String,
    pub alert_id: String,
    pub ticker: String,
    pub price: f64,
    pub direction: Direction,
    pub triggered_at: DateTime<Utc>,
    pub delivery: DeliveryStatus,
}

/// # Summary
/// 条件写入的结果。
#[derive(Debug, Clone, PartialEq)]
pub enum AppendOutcome {
    // 写入成功
    Inserted(TriggerRecord),
    // 窗口内已有记录，未写入
    Duplicate,
}
