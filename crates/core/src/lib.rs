//! # `keiho-core` - 领域内核
//!
//! 价格预警引擎的实体、端口 (Trait) 与错误定义。
//! 本 crate 不依赖任何具体基础设施，存储、行情与通知的实现均位于各自的适配器 crate 中。
//!
//! ## 模块划分
//! - `alert`: 预警定义与运行时状态
//! - `trigger`: 触发记录及其持久化日志端口
//! - `account`: 用户券商凭证与联系方式
//! - `market`: 价格快照与行情源端口
//! - `notify`: 通知渠道端口
//! - `store`: 存储层错误
//! - `common`: 时间周期、时钟抽象

pub mod account;
pub mod alert;
pub mod common;
pub mod config;
pub mod market;
pub mod notify;
pub mod store;
pub mod trigger;

#[cfg(feature = "test-utils")]
pub mod test_utils;
