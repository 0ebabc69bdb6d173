use thiserror::Error;

/// # Summary
/// 行情域错误枚举，处理网络、解析、凭证及数据缺失等问题。
///
/// # Invariants
/// - 必须通过 `thiserror` 派生 `Error` trait。
/// - 引擎对所有变体一视同仁：跳过该标的本轮评估。
#[derive(Error, Debug)]
pub enum MarketError {
    // 网络层错误，包含底层 HTTP 客户端错误信息
    #[error("Network error: {0}")]
    Network(String),
    // 数据解析错误，包括价格字段缺失或非有限值
    #[error("Parse error: {0}")]
    Parse(String),
    // 请求的标的不存在
    #[error("Data not found")]
    NotFound,
    // 凭证缺失、过期或被拒绝
    #[error("Credential error: {0}")]
    Credential(String),
    // 未知或未分类的错误
    #[error("Unknown error: {0}")]
    Unknown(String),
}
