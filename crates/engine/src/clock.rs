use crate::error::EngineError;
use chrono::offset::LocalResult;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use keiho_core::common::TimeFrame;
use keiho_core::config::EngineConfig;

// 开盘时刻落在夏令时缺口内时最多向后试探的分钟数
const GAP_SHIFT_LIMIT_MINUTES: i64 = 120;
// 回溯寻找上一个交易日的天数上限（覆盖一个完整周末）
const SESSION_LOOKBACK_DAYS: i64 = 7;

/// # Summary
/// 周期分桶时钟：把 (周期, 当前时刻) 映射为当前“蜡烛”桶的起点。
///
/// # Invariants
/// - 纯函数，无副作用；同一输入永远得到同一输出。
/// - 固定时长周期按 Unix 纪元对齐，不涉及时区。
/// - 日线以交易所当地开盘时刻为桶起点，只计周一至周五，不建模节假日。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandleClock {
    // 交易所时区
    tz: Tz,
    // 当地开盘时刻
    open: NaiveTime,
}

impl Default for CandleClock {
    /// 纽约 09:30 开盘
    fn default() -> Self {
        Self {
            tz: chrono_tz::America::New_York,
            open: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl CandleClock {
    pub fn new(tz: Tz, open: NaiveTime) -> Self {
        Self { tz, open }
    }

    /// # Summary
    /// 从引擎配置构造时钟。
    ///
    /// # Returns
    /// 时区名称或开盘时刻 (`HH:MM`) 非法时返回 `EngineError::Config`。
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let tz: Tz = config.exchange_timezone.parse().map_err(|e| {
            EngineError::Config(format!(
                "invalid exchange_timezone {}: {}",
                config.exchange_timezone, e
            ))
        })?;
        let open = NaiveTime::parse_from_str(&config.market_open, "%H:%M").map_err(|e| {
            EngineError::Config(format!("invalid market_open {}: {}", config.market_open, e))
        })?;
        Ok(Self { tz, open })
    }

    /// # Summary
    /// 计算 `now` 所在桶的起点。
    ///
    /// # Logic
    /// 1. 固定周期：`floor(now / d) * d`，对负时间戳同样向下取整。
    /// 2. 日线：取 `now` 当时或之前最近一个交易日的开盘时刻。
    ///
    /// # Arguments
    /// * `timeframe` - 预警周期。
    /// * `now` - 当前时刻。
    ///
    /// # Returns
    /// 桶起点（UTC），恒不晚于 `now`。
    pub fn bucket_start(&self, timeframe: TimeFrame, now: DateTime<Utc>) -> DateTime<Utc> {
        match timeframe.fixed_secs() {
            Some(secs) => {
                let floor = now.timestamp().div_euclid(secs) * secs;
                DateTime::from_timestamp(floor, 0).unwrap_or(now)
            }
            None => self.session_start(now),
        }
    }

    /// # Summary
    /// 日线桶起点。
    ///
    /// # Logic
    /// 从 `now` 的当地日期开始逐日回溯，跳过周末，返回第一个不晚于 `now` 的开盘时刻。
    /// 回溯窗口覆盖整周，正常时区下必然命中；极端情况下退回到 UTC 自然日零点。
    fn session_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.with_timezone(&self.tz).date_naive();
        for back in 0..=SESSION_LOOKBACK_DAYS {
            let Some(day) = today.checked_sub_signed(Duration::days(back)) else {
                break;
            };
            if matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
                continue;
            }
            if let Some(open) = self.session_open(day)
                && open <= now
            {
                return open;
            }
        }
        let fallback = now.timestamp().div_euclid(86_400) * 86_400;
        DateTime::from_timestamp(fallback, 0).unwrap_or(now)
    }

    /// 指定当地日期的开盘时刻（UTC）
    fn session_open(&self, day: NaiveDate) -> Option<DateTime<Utc>> {
        resolve_local(self.tz, day, self.open)
    }
}

/// # Summary
/// 把当地日期 + 时刻解析为 UTC 时间。
///
/// # Logic
/// * 唯一映射：直接返回。
/// * 夏令时回拨产生歧义：取较早的时刻。
/// * 夏令时跳变落入缺口：逐分钟向后试探，返回第一个合法时刻。
pub(crate) fn resolve_local(tz: Tz, day: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
    let naive = day.and_time(time);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => (1..=GAP_SHIFT_LIMIT_MINUTES).find_map(|m| {
            match tz.from_local_datetime(&(naive + Duration::minutes(m))) {
                LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
                LocalResult::Ambiguous(dt, _) => Some(dt.with_timezone(&Utc)),
                LocalResult::None => None,
            }
        }),
    }
}
