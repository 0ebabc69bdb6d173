//! # `keiho-manager` - 预警调度
//!
//! 用快速轮询与对账轮询两个定时器驱动 `keiho-engine`，负责启停与显式刷新。

pub mod scheduler;

pub use keiho_engine::error::EngineError;
