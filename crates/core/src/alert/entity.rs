use crate::common::TimeFrame;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// # Summary
/// 预警方向。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    // 价格上穿（含等于）阈值
    Above,
    // 价格下穿（含等于）阈值
    Below,
}

impl Direction {
    /// # Summary
    /// 穿越判定。
    ///
    /// # Logic
    /// 仅使用最新成交价，不看 K 线的最高/最低价，边界值视为已穿越。
    ///
    /// # Arguments
    /// * `last` - 最新成交价。
    /// * `threshold` - 预警阈值。
    ///
    /// # Returns
    /// 满足触发条件返回 `true`。
    pub fn is_crossed(self, last: f64, threshold: f64) -> bool {
        match self {
            Direction::Above => last >= threshold,
            Direction::Below => last <= threshold,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Above => write!(f, "above"),
            Direction::Below => write!(f, "below"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "above" => Ok(Direction::Above),
            "below" => Ok(Direction::Below),
            _ => Err(format!("Unknown Direction: {}", s)),
        }
    }
}

/// # Summary
/// 预警定义，在一次加载周期内不可变。
///
/// # Invariants
/// - `id` 全局唯一。
/// - 由外部 CRUD 层创建和修改，引擎只读取 `active == true` 的记录。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    // 预警唯一标识
    pub id: String,
    // 所属用户
    pub user_id: String,
    // 标的代码 (例如: MNQ, AAPL)
    pub ticker: String,
    // 触发方向
    pub direction: Direction,
    // 阈值价格
    pub threshold: f64,
    // 分桶周期
    pub timeframe: TimeFrame,
    // 分类标签 (例如统计带名称)，仅用于通知文案
    pub tag: Option<String>,
    // 用户备注
    pub note: Option<String>,
    // 是否启用
    pub active: bool,
    // 创建时间
    pub created_at: DateTime<Utc>,
}

/// # Summary
/// 单个预警的内存运行状态。
///
/// # Invariants
/// - `triggered_this_bucket == false` 即 ARMED，`true` 即 FIRED。
/// - 当前桶起点与 `last_bucket_start` 不同时必须重置为 ARMED。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertState {
    // 本桶内是否已触发
    pub triggered_this_bucket: bool,
    // 最近一次观察到的价格
    pub last_observed_price: Option<f64>,
    // 最近一次评估所在桶的起点
    pub last_bucket_start: Option<DateTime<Utc>>,
}

impl AlertState {
    /// 是否处于可触发 (ARMED) 状态
    pub fn is_armed(&self) -> bool {
        !self.triggered_this_bucket
    }
}
