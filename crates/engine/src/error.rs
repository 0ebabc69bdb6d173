use keiho_core::store::error::StoreError;
use thiserror::Error;

/// # Summary
/// 引擎层的统一错误类型。
///
/// # Invariants
/// - 评估轮次内部的错误一律“记录并跳过”，不会以此类型向上传播；
///   只有构造期配置错误与显式 `refresh` 的重载失败会返回给调用方。
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Config error: {0}")]
    Config(String),
}
