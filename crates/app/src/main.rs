mod logging;
mod settings;

use keiho_core::account::port::AccountStore;
use keiho_core::common::time::RealTimeProvider;
use keiho_core::market::port::PriceSource;
use keiho_core::notify::port::Notifier;
use keiho_engine::engine::{AlertEngine, EnginePorts};
use keiho_feed::broker::BrokerProvider;
use keiho_feed::yahoo::YahooProvider;
use keiho_manager::scheduler::AlertManager;
use keiho_notify::email::EmailNotifier;
use keiho_notify::sms::SmsNotifier;
use keiho_store::account::SqliteAccountStore;
use keiho_store::alert::SqliteAlertStore;
use keiho_store::trigger::SqliteTriggerLog;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

// 停机时等待待发通知的上限
const DISPATCH_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// # Summary
/// 应用启动入口，纯粹的 DI 容器。
/// 负责实例化所有具体实现组件并通过 `Arc<dyn Trait>` 注入到引擎与调度器。
///
/// # Logic
/// 1. 加载配置并初始化全局日志。
/// 2. 安装 TLS 加密后端（行情与短信客户端共用）。
/// 3. 实例化基础设施层（Store、Feed、Notify）。
/// 4. 构造引擎与调度器并启动两个轮询定时器。
/// 5. 挂起等待外部信号，收到后停止调度（进行中的评估会先完成），再等待待发通知发完。
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. 配置与日志
    let config = settings::load()?;
    let _log_guard = logging::init(&config.log)?;
    info!("Keiho alert engine starting...");

    // 2. TLS
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("TLS crypto provider already installed");
    }

    // 3. 基础设施层
    keiho_store::config::set_root_dir(PathBuf::from(&config.database.data_dir));
    let pool = keiho_store::db::connect_default().await?;
    let accounts: Arc<dyn AccountStore> = Arc::new(SqliteAccountStore::new(pool.clone()));

    let timeout = Duration::from_secs(config.feed.timeout_secs);
    let source: Arc<dyn PriceSource> = match config.feed.provider.as_str() {
        "broker" => Arc::new(BrokerProvider::new(
            &config.feed.broker_base_url,
            accounts.clone(),
            timeout,
        )?),
        "yahoo" => Arc::new(YahooProvider::new(timeout)?),
        other => return Err(format!("Unknown feed provider: {}", other).into()),
    };
    info!(provider = %config.feed.provider, "Price source ready");

    let sms: Option<Arc<dyn Notifier>> = match &config.notify.sms {
        Some(sms) => Some(Arc::new(SmsNotifier::new(sms, timeout)?)),
        None => {
            info!("SMS channel not configured");
            None
        }
    };
    let email: Option<Arc<dyn Notifier>> = match &config.notify.email {
        Some(email) => Some(Arc::new(EmailNotifier::new(email)?)),
        None => {
            info!("Email channel not configured");
            None
        }
    };

    // 4. 引擎与调度器
    let engine = AlertEngine::new(
        EnginePorts {
            alerts: Arc::new(SqliteAlertStore::new(pool.clone())),
            triggers: Arc::new(SqliteTriggerLog::new(pool)),
            source,
            accounts,
            sms,
            email,
            time: Arc::new(RealTimeProvider),
        },
        &config.engine,
    )?;
    let manager = AlertManager::from_config(engine.clone(), &config.engine)?;
    manager.start();

    info!("AlertManager running. Waiting for signals...");

    // 5. 等待退出信号
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Stopping...");
    manager.stop().await;
    engine.shutdown(DISPATCH_DRAIN_TIMEOUT).await;

    Ok(())
}
