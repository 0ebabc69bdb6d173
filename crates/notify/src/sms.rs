use async_trait::async_trait;
use keiho_core::config::SmsConfig;
use keiho_core::notify::error::NotifyError;
use keiho_core::notify::port::{Channel, Notifier};
use serde::Serialize;
use std::time::Duration;

/// # Summary
/// 通过 HTTP 短信网关发送通知。
///
/// # Invariants
/// * 网关接受 `POST {gateway_url}`，JSON 体为 `{to, from, message}`，
///   以 `Authorization: Bearer {api_key}` 鉴权。
/// * 不做同步重试，失败由调用方记录。
pub struct SmsNotifier {
    gateway_url: String,
    api_key: String,
    sender: String,
    client: reqwest::Client,
}

/// 网关请求体
#[derive(Serialize)]
struct SmsPayload<'a> {
    to: &'a str,
    from: &'a str,
    message: &'a str,
}

impl SmsNotifier {
    /// # Summary
    /// 根据 `[notify.sms]` 配置创建短信通知器。
    ///
    /// # Arguments
    /// * `config` - 网关地址、密钥与发送方号码。
    /// * `timeout` - 单次请求超时。
    ///
    /// # Returns
    /// * 网关地址为空或客户端构建失败时返回 `NotifyError::Config`。
    pub fn new(config: &SmsConfig, timeout: Duration) -> Result<Self, NotifyError> {
        if config.gateway_url.trim().is_empty() {
            return Err(NotifyError::Config("SMS gateway url is empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            gateway_url: config.gateway_url.clone(),
            api_key: config.api_key.clone(),
            sender: config.sender.clone(),
            client,
        })
    }
}

#[async_trait]
impl Notifier for SmsNotifier {
    fn channel(&self) -> Channel {
        Channel::Sms
    }

    /// # Summary
    /// 向一个手机号发送短信，`subject` 不参与短信正文。
    ///
    /// # Returns
    /// * 网关返回非 2xx 时返回 `NotifyError::Platform`，附带响应正文。
    async fn notify(
        &self,
        recipient: &str,
        _subject: &str,
        content: &str,
    ) -> Result<(), NotifyError> {
        let payload = SmsPayload {
            to: recipient,
            from: &self.sender,
            message: content,
        };

        let response = self
            .client
            .post(&self.gateway_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(NotifyError::Platform(format!(
                "SMS gateway error {}: {}",
                status, error_text
            )));
        }

        Ok(())
    }
}
