use crate::store::error::StoreError;
use crate::trigger::entity::{AppendOutcome, DeliveryStatus, TriggerDraft, TriggerRecord};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

/// # Summary
/// 触发日志接口：跨进程、跨重启去重的唯一事实来源。
///
/// # Invariants
/// - 只追加，不删除。
/// - `append` 必须是条件写入：窗口内已有同一预警的记录时不得插入。
/// - 实现类必须保证线程安全 (`Send` + `Sync`)。
#[async_trait]
pub trait TriggerLog: Send + Sync {
    /// # Summary
    /// 查询窗口内最近的一条触发记录。
    ///
    /// # Logic
    /// 返回 `triggered_at > now - within` 的最新记录。
    ///
    /// # Arguments
    /// * `alert_id` - 预警 ID。
    /// * `within` - 回溯窗口。
    /// * `now` - 窗口的右端点。
    ///
    /// # Returns
    /// * `Result<Option<TriggerRecord>, StoreError>`
    async fn recent_trigger(
        &self,
        alert_id: &str,
        within: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<TriggerRecord>, StoreError>;

    /// # Summary
    /// 条件追加一条触发记录。
    ///
    /// # Logic
    /// 1. 在同一个原子操作中检查 `(draft.triggered_at - window, draft.triggered_at]` 内是否已有记录。
    /// 2. 没有则插入并返回 `Inserted`，有则返回 `Duplicate`。
    ///
    /// # Arguments
    /// * `draft` - 待写入的触发数据。
    /// * `window` - 去重窗口，即预警周期的最小间隔。
    ///
    /// # Returns
    /// * `Result<AppendOutcome, StoreError>`
    async fn append(
        &self,
        draft: &TriggerDraft,
        window: Duration,
    ) -> Result<AppendOutcome, StoreError>;

    /// # Summary
    /// 更新投递状态，仅供观测。
    ///
    /// # Arguments
    /// * `trigger_id` - 触发记录 ID。
    /// * `status` - 新状态。
    ///
    /// # Returns
    /// * `Result<(), StoreError>` - 记录不存在时返回 `StoreError::NotFound`。
    async fn mark_delivery(&self, trigger_id: &str, status: DeliveryStatus)
    -> Result<(), StoreError>;
}
