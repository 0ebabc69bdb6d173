use crate::book::{AlertBook, ReloadStats};
use crate::error::EngineError;
use keiho_core::alert::port::AlertRepository;
use std::sync::Arc;
use tracing::{info, warn};

/// # Summary
/// 活跃预警的内存索引：持久化仓库 + 状态容器。
///
/// # Invariants
/// - 重载失败时保持上一次成功加载的内容（last-known-good），既不清空也不部分替换。
/// - 本类型不做内部同步，由引擎的评估闸门保证重载与评估互斥，
///   因此评估方永远看不到重建到一半的索引。
pub struct AlertIndex {
    repo: Arc<dyn AlertRepository>,
    book: AlertBook,
}

impl AlertIndex {
    /// 创建空索引，需调用 `reload` 才会载入预警
    pub fn new(repo: Arc<dyn AlertRepository>) -> Self {
        Self {
            repo,
            book: AlertBook::new(),
        }
    }

    /// # Summary
    /// 从仓库重新加载全部活跃预警。
    ///
    /// # Logic
    /// 1. 先完整读取仓库结果。
    /// 2. 读取成功后一次性替换状态容器；失败则原样保留并返回错误。
    ///
    /// # Returns
    /// 成功返回重载统计，失败返回 `EngineError::Store`。
    pub async fn reload(&mut self) -> Result<ReloadStats, EngineError> {
        let alerts = match self.repo.load_active().await {
            Ok(alerts) => alerts,
            Err(e) => {
                warn!(error = %e, kept = self.book.len(), "Alert reload failed, keeping last-known-good index");
                return Err(e.into());
            }
        };

        let stats = self.book.replace(alerts);
        if stats.added > 0 || stats.removed > 0 {
            info!(
                added = stats.added,
                removed = stats.removed,
                total = stats.total,
                "Alert index reloaded"
            );
        }
        Ok(stats)
    }

    pub fn book(&self) -> &AlertBook {
        &self.book
    }

    pub fn book_mut(&mut self) -> &mut AlertBook {
        &mut self.book
    }
}
