use keiho_core::account::port::AccountStore;
use keiho_core::alert::entity::Alert;
use keiho_core::notify::port::Notifier;
use keiho_core::trigger::entity::{DeliveryStatus, TriggerRecord};
use keiho_core::trigger::port::TriggerLog;
use keiho_notify::message;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// # Summary
/// 交给派发协程的一次通知任务。
#[derive(Debug, Clone)]
pub struct DispatchJob {
    pub alert: Arc<Alert>,
    pub trigger_price: f64,
    pub record: TriggerRecord,
}

/// # Summary
/// 通知派发器：把已落库的触发记录发送到短信与邮件渠道。
///
/// # Invariants
/// - 从不向调用方返回错误，所有失败只记录日志。
/// - 各渠道并发且互相独立，一个渠道失败不影响另一个。
/// - 只回写 `delivery` 观察字段，去重逻辑从不读取它。
pub struct NotificationDispatcher {
    accounts: Arc<dyn AccountStore>,
    sms: Option<Arc<dyn Notifier>>,
    email: Option<Arc<dyn Notifier>>,
    triggers: Arc<dyn TriggerLog>,
}

impl NotificationDispatcher {
    /// # Summary
    /// 创建派发器，未配置的渠道传 `None`。
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        sms: Option<Arc<dyn Notifier>>,
        email: Option<Arc<dyn Notifier>>,
        triggers: Arc<dyn TriggerLog>,
    ) -> Self {
        Self {
            accounts,
            sms,
            email,
            triggers,
        }
    }

    /// # Summary
    /// 派发一次触发通知。
    ///
    /// # Logic
    /// 1. 读取预警所属用户的联系方式，读取失败或不存在视为无可用渠道。
    /// 2. 渠道满足“已配置 + 有地址 + 已开启”才会尝试，短信与邮件并发发送。
    /// 3. 汇总结果：全部成功 `Delivered`，部分成功 `Partial`，其余 `Failed`。
    /// 4. 回写投递状态，回写失败只记录日志。
    ///
    /// # Arguments
    /// * `alert` - 预警定义。
    /// * `trigger_price` - 触发价格。
    /// * `record` - 已落库的触发记录。
    ///
    /// # Returns
    /// 汇总后的投递状态。
    pub async fn dispatch(
        &self,
        alert: &Alert,
        trigger_price: f64,
        record: &TriggerRecord,
    ) -> DeliveryStatus {
        let contact = match self.accounts.contact(&alert.user_id).await {
            Ok(contact) => contact,
            Err(e) => {
                warn!(user_id = %alert.user_id, error = %e, "Contact lookup failed");
                None
            }
        };

        let rendered = message::render(alert, trigger_price, record);

        let (sms_target, email_target) = match &contact {
            Some(c) => (
                c.phone.as_deref().filter(|_| c.sms_enabled),
                c.email.as_deref().filter(|_| c.email_enabled),
            ),
            None => (None, None),
        };

        let (sms_result, email_result) = futures::join!(
            send(self.sms.as_ref(), sms_target, &rendered.subject, &rendered.sms, &alert.id),
            send(self.email.as_ref(), email_target, &rendered.subject, &rendered.body, &alert.id),
        );

        let attempted: Vec<bool> = [sms_result, email_result].into_iter().flatten().collect();
        let status = summarize(&attempted);

        if attempted.is_empty() {
            warn!(alert_id = %alert.id, user_id = %alert.user_id, "No notification channel available");
        } else {
            info!(alert_id = %alert.id, trigger_id = %record.id, status = %status, "Notification dispatched");
        }

        if let Err(e) = self.triggers.mark_delivery(&record.id, status).await {
            warn!(trigger_id = %record.id, error = %e, "Failed to record delivery status");
        }

        status
    }

    /// # Summary
    /// 派发协程主循环：逐个处理队列中的任务，发送端全部关闭后退出。
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<DispatchJob>) {
        info!("Notification dispatcher started");
        while let Some(job) = rx.recv().await {
            self.dispatch(&job.alert, job.trigger_price, &job.record)
                .await;
        }
        debug!("Notification dispatcher stopped");
    }
}

/// 单渠道发送；未尝试返回 `None`，否则返回是否成功
async fn send(
    notifier: Option<&Arc<dyn Notifier>>,
    recipient: Option<&str>,
    subject: &str,
    content: &str,
    alert_id: &str,
) -> Option<bool> {
    let (notifier, recipient) = (notifier?, recipient?);
    match notifier.notify(recipient, subject, content).await {
        Ok(()) => Some(true),
        Err(e) => {
            warn!(alert_id, channel = %notifier.channel(), error = %e, "Notification channel failed");
            Some(false)
        }
    }
}

fn summarize(attempted: &[bool]) -> DeliveryStatus {
    let ok = attempted.iter().filter(|r| **r).count();
    if attempted.is_empty() || ok == 0 {
        DeliveryStatus::Failed
    } else if ok == attempted.len() {
        DeliveryStatus::Delivered
    } else {
        DeliveryStatus::Partial
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize() {
        assert_eq!(summarize(&[]), DeliveryStatus::Failed);
        assert_eq!(summarize(&[false, false]), DeliveryStatus::Failed);
        assert_eq!(summarize(&[true, false]), DeliveryStatus::Partial);
        assert_eq!(summarize(&[true]), DeliveryStatus::Delivered);
        assert_eq!(summarize(&[true, true]), DeliveryStatus::Delivered);
    }
}
