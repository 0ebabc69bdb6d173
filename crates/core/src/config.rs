use serde::{Deserialize, Serialize};

/// 全局应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub engine: EngineConfig,
    pub feed: FeedConfig,
    pub notify: NotifyConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub data_dir: String,
}

/// # Summary
/// 预警引擎调度参数。
///
/// # Invariants
/// - `exchange_timezone` 必须是 IANA 时区名，`market_open` 为 `HH:MM` 当地时间。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // 快速评估周期（秒）
    pub fast_interval_secs: u64,
    // 对账周期（秒）：重新加载预警并补跑一轮评估
    pub reconcile_interval_secs: u64,
    // 单轮内并发抓取行情的上限
    pub fetch_concurrency: usize,
    // 交易所时区，仅用于日线分桶
    pub exchange_timezone: String,
    // 开盘时刻
    pub market_open: String,
    // 待投递通知队列容量
    pub dispatch_queue: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    // "broker" 或 "yahoo"
    pub provider: String,
    pub broker_base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    // 缺省即关闭邮件渠道
    pub email: Option<EmailConfig>,
    // 缺省即关闭短信渠道
    pub sms: Option<SmsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub host: String,
    pub user: String,
    pub pass: String,
    pub from: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsConfig {
    pub gateway_url: String,
    pub api_key: String,
    pub sender: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub dir: String,
    pub level: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fast_interval_secs: 10,
            reconcile_interval_secs: 60,
            fetch_concurrency: 8,
            exchange_timezone: "America/New_York".to_string(),
            market_open: "09:30".to_string(),
            dispatch_queue: 256,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            provider: "broker".to_string(),
            broker_base_url: "https://api.tradier.com".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: "logs".to_string(),
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.database.data_dir, "data");
        assert_eq!(config.engine.fast_interval_secs, 10);
        assert_eq!(config.engine.reconcile_interval_secs, 60);
        assert_eq!(config.engine.exchange_timezone, "America/New_York");
        assert_eq!(config.engine.market_open, "09:30");
        assert_eq!(config.feed.provider, "broker");
        assert!(config.notify.email.is_none());
        assert!(config.notify.sms.is_none());
    }
}
