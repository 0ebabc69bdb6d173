//! # `keiho-engine` - 价格预警评估引擎
//!
//! 数据流：
//! 分组快照 (`index`) -> 并发抓价 -> 状态机评估 (`evaluator`) -> 条件落库 -> 派发 (`dispatcher`)。
//!
//! 所有评估与重载都在 [`engine::AlertEngine`] 的互斥闸门内执行。

pub mod book;
pub mod clock;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod index;
