use keiho_core::config::LogConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// # Summary
/// 初始化全局日志：控制台输出 + 按天滚动的文件输出。
///
/// # Logic
/// 1. 过滤级别优先读取 `RUST_LOG`，否则使用配置中的 `level`。
/// 2. 文件写入走 `tracing_appender` 的非阻塞通道。
///
/// # Returns
/// 文件写入协程的守卫，必须在进程生命周期内持有，丢弃后缓冲日志会被刷出并停止写入。
pub fn init(config: &LogConfig) -> Result<WorkerGuard, Box<dyn std::error::Error>> {
    let file_appender = tracing_appender::rolling::daily(&config.dir, "keiho.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .try_init()?;

    Ok(guard)
}
