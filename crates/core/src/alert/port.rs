use crate::alert::entity::Alert;
use crate::store::error::StoreError;
use async_trait::async_trait;

/// # Summary
/// 预警定义的持久化读取接口。
///
/// # Invariants
/// - 实现类必须保证线程安全 (`Send` + `Sync`)。
/// - 引擎只通过本接口读取预警，从不写入。
#[async_trait]
pub trait AlertRepository: Send + Sync {
    /// # Summary
    /// 加载全部启用中的预警。
    ///
    /// # Logic
    /// 1. 过滤 `active = true` 的记录。
    /// 2. 按创建时间、再按 ID 升序排列，保证分组后的顺序稳定。
    ///
    /// # Returns
    /// * `Result<Vec<Alert>, StoreError>`
    async fn load_active(&self) -> Result<Vec<Alert>, StoreError>;
}
