//! # `keiho-store` - SQLite 持久化适配器
//!
//! 为 `keiho-core` 的存储端口提供基于 `sqlx` + SQLite 的实现。
//! 所有适配器共享 `db::connect` 返回的同一个连接池。

pub mod account;
pub mod alert;
pub mod config;
pub mod db;
pub mod trigger;
