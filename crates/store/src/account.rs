use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keiho_core::account::entity::{BrokerCredential, UserContact};
use keiho_core::account::port::AccountStore;
use keiho_core::store::error::StoreError;
use sqlx::SqlitePool;

/// # Summary
/// `AccountStore` 的 SQLite 实现，管理券商凭证与通知联系方式。
///
/// # Invariants
/// * 凭证以 `(user_id, account_id)` 为主键，读取时取最近更新的一行，
///   即“每个用户一组生效凭证”。
/// * 令牌刷新由外部 OAuth 流程写入，本模块只做存取。
pub struct SqliteAccountStore {
    pool: SqlitePool,
}

impl SqliteAccountStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// # Summary
    /// 保存或更新券商凭证。
    pub async fn save_credential(&self, credential: &BrokerCredential) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT OR REPLACE INTO broker_credentials (user_id, access_token, account_id, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&credential.user_id)
        .bind(&credential.access_token)
        .bind(&credential.account_id)
        .bind(credential.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    /// # Summary
    /// 保存或更新用户联系方式。
    pub async fn save_contact(&self, contact: &UserContact) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT OR REPLACE INTO user_contacts (user_id, email, phone, email_enabled, sms_enabled) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&contact.user_id)
        .bind(&contact.email)
        .bind(&contact.phone)
        .bind(contact.email_enabled)
        .bind(contact.sms_enabled)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl AccountStore for SqliteAccountStore {
    async fn credential(&self, user_id: &str) -> Result<Option<BrokerCredential>, StoreError> {
        Ok(sqlx::query_as::<_, (String, String, String, DateTime<Utc>)>(
            r#"
            SELECT user_id, access_token, account_id, updated_at
            FROM broker_credentials WHERE user_id = ?
            ORDER BY updated_at DESC LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?
        .map(|r| BrokerCredential {
            user_id: r.0,
            access_token: r.1,
            account_id: r.2,
            updated_at: r.3,
        }))
    }

    async fn contact(&self, user_id: &str) -> Result<Option<UserContact>, StoreError> {
        Ok(sqlx::query_as::<_, (String, Option<String>, Option<String>, bool, bool)>(
            "SELECT user_id, email, phone, email_enabled, sms_enabled FROM user_contacts WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?
        .map(|r| UserContact {
            user_id: r.0,
            email: r.1,
            phone: r.2,
            email_enabled: r.3,
            sms_enabled: r.4,
        }))
    }
}
