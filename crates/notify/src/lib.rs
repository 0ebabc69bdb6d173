//! # `keiho-notify` - 通知渠道适配器
//!
//! 每个 `Notifier` 实现只负责一个渠道，收件地址由调用方逐次传入。

pub mod email;
pub mod message;
pub mod sms;
