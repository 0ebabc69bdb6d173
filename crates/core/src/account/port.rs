use crate::account::entity::{BrokerCredential, UserContact};
use crate::store::error::StoreError;
use async_trait::async_trait;

/// # Summary
/// 用户账户侧数据的只读接口：券商凭证与联系方式。
///
/// # Invariants
/// - 实现类必须保证线程安全 (`Send` + `Sync`)。
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// # Summary
    /// 获取用户当前生效的券商凭证。
    ///
    /// # Arguments
    /// * `user_id` - 用户标识符。
    ///
    /// # Returns
    /// * `Result<Option<BrokerCredential>, StoreError>` - 多组凭证时返回最近更新的一组。
    async fn credential(&self, user_id: &str) -> Result<Option<BrokerCredential>, StoreError>;

    /// # Summary
    /// 获取用户的通知联系方式。
    ///
    /// # Arguments
    /// * `user_id` - 用户标识符。
    ///
    /// # Returns
    /// * `Result<Option<UserContact>, StoreError>`
    async fn contact(&self, user_id: &str) -> Result<Option<UserContact>, StoreError>;
}
