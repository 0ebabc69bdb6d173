use crate::notify::error::NotifyError;
use async_trait::async_trait;

/// # Summary
/// 通知渠道类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Sms,
    Email,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Sms => write!(f, "sms"),
            Channel::Email => write!(f, "email"),
        }
    }
}

/// # Summary
/// 发送通知到外部系统的接口定义。
///
/// # Invariants
/// - 实现必须是 `Send` 和 `Sync` 以支持并发调用。
/// - 每个实现只负责一个渠道，渠道之间互不影响。
#[async_trait]
pub trait Notifier: Send + Sync {
    /// 该实现对应的渠道
    fn channel(&self) -> Channel;

    /// # Summary
    /// 向指定接收方发送带有主题和内容的通知。
    ///
    /// # Logic
    /// 1. 根据目标平台要求格式化消息。
    /// 2. 通过底层传输协议发送消息。
    ///
    /// # Arguments
    /// * `recipient` - 接收方地址（邮箱或手机号）。
    /// * `subject` - 通知标题或主题，短信渠道可忽略。
    /// * `content` - 通知的具体内容。
    ///
    /// # Returns
    /// * 成功返回 `Ok(())`。
    /// * 失败返回 `Err(NotifyError)`。
    async fn notify(&self, recipient: &str, subject: &str, content: &str)
    -> Result<(), NotifyError>;
}
