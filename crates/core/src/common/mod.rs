use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub mod time;

/// # Summary
/// 预警时间周期枚举，定义“蜡烛”桶的跨度。
///
/// # Invariants
/// - 除 `Day1` 外均为固定时长，按 Unix 纪元对齐分桶。
/// - `Day1` 以交易所当地开盘时刻为桶起点。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimeFrame {
    // 5分钟
    Minute5,
    // 15分钟
    Minute15,
    // 30分钟
    Minute30,
    // 1小时
    Hour1,
    // 4小时
    Hour4,
    // 日线
    Day1,
}

impl TimeFrame {
    /// 全部周期，按跨度升序。
    pub const ALL: [TimeFrame; 6] = [
        TimeFrame::Minute5,
        TimeFrame::Minute15,
        TimeFrame::Minute30,
        TimeFrame::Hour1,
        TimeFrame::Hour4,
        TimeFrame::Day1,
    ];

    /// # Summary
    /// 固定时长周期的秒数。
    ///
    /// # Returns
    /// 固定周期返回秒数，`Day1` 返回 `None`（由开盘时刻决定）。
    pub fn fixed_secs(self) -> Option<i64> {
        match self {
            TimeFrame::Minute5 => Some(300),
            TimeFrame::Minute15 => Some(900),
            TimeFrame::Minute30 => Some(1_800),
            TimeFrame::Hour1 => Some(3_600),
            TimeFrame::Hour4 => Some(14_400),
            TimeFrame::Day1 => None,
        }
    }

    /// # Summary
    /// 同一预警两次触发之间允许的最小间隔。
    ///
    /// # Logic
    /// 固定周期即其自身时长，日线为 1 天。
    pub fn min_interval(self) -> Duration {
        match self.fixed_secs() {
            Some(secs) => Duration::seconds(secs),
            None => Duration::days(1),
        }
    }
}

impl FromStr for TimeFrame {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "5min" | "5m" => Ok(TimeFrame::Minute5),
            "15min" | "15m" => Ok(TimeFrame::Minute15),
            "30min" | "30m" => Ok(TimeFrame::Minute30),
            "1hour" | "1h" | "60min" => Ok(TimeFrame::Hour1),
            "4hour" | "4h" => Ok(TimeFrame::Hour4),
            "daily" | "1d" | "day" => Ok(TimeFrame::Day1),
            _ => Err(format!("Unknown TimeFrame: {}", s)),
        }
    }
}

impl std::fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeFrame::Minute5 => write!(f, "5min"),
            TimeFrame::Minute15 => write!(f, "15min"),
            TimeFrame::Minute30 => write!(f, "30min"),
            TimeFrame::Hour1 => write!(f, "1hour"),
            TimeFrame::Hour4 => write!(f, "4hour"),
            TimeFrame::Day1 => write!(f, "daily"),
        }
    }
}
