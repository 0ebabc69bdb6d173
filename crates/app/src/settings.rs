use config::{Config, ConfigError, Environment, File};
use keiho_core::config::AppConfig;
use std::path::Path;

/// 指定配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "KEIHO_CONFIG";
/// 默认配置文件
pub const DEFAULT_CONFIG_FILE: &str = "keiho.toml";

/// # Summary
/// 加载应用配置。
///
/// # Logic
/// 配置文件路径取自 `KEIHO_CONFIG`，未设置时为当前目录下的 `keiho.toml`。
pub fn load() -> Result<AppConfig, ConfigError> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
    load_from(Path::new(&path))
}

/// # Summary
/// 按 “默认值 <- 配置文件 <- 环境变量” 的优先级合并配置。
///
/// # Logic
/// 1. 以 `AppConfig::default()` 作为最底层来源。
/// 2. 配置文件可选，不存在时忽略；格式由扩展名决定。
/// 3. 环境变量以 `KEIHO__` 为前缀、`__` 分隔层级，例如
///    `KEIHO__ENGINE__FAST_INTERVAL_SECS=5`。
///
/// # Arguments
/// * `path` - 配置文件路径。
///
/// # Returns
/// * `Result<AppConfig, ConfigError>`
pub fn load_from(path: &Path) -> Result<AppConfig, ConfigError> {
    Config::builder()
        .add_source(Config::try_from(&AppConfig::default())?)
        .add_source(File::from(path).required(false))
        .add_source(
            Environment::with_prefix("KEIHO")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}
