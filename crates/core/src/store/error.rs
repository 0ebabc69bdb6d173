use thiserror::Error;

/// # Summary
/// 存储层错误枚举，处理数据库连接、读写失败等问题。
///
/// # Invariants
/// - 必须通过 `thiserror` 派生 `Error` trait。
/// - 触发日志返回任意变体时，引擎都不会发出通知。
#[derive(Error, Debug)]
pub enum StoreError {
    /// 数据库操作失败
    #[error("Database error: {0}")]
    Database(String),
    /// 记录未找到
    #[error("Not found")]
    NotFound,
    /// 记录中的字段无法还原为领域类型
    #[error("Corrupt record: {0}")]
    Corrupt(String),
    /// 初始化存储失败
    #[error("Initialization error: {0}")]
    InitError(String),
}
