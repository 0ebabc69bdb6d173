use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// # Summary
/// 用户的券商访问凭证。
///
/// # Invariants
/// - 每个用户同一时刻只有一组生效凭证（最近更新的那一组）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerCredential {
    pub user_id: String,
    // OAuth 访问令牌，由外部刷新流程维护
    pub access_token: String,
    // 券商账户号
    pub account_id: String,
    pub updated_at: DateTime<Utc>,
}

/// # Summary
/// 用户的通知联系方式及渠道开关。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContact {
    pub user_id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub email_enabled: bool,
    pub sms_enabled: bool,
}
