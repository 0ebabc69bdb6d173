use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use keiho_core::store::error::StoreError;
use keiho_core::trigger::entity::{AppendOutcome, DeliveryStatus, TriggerDraft, TriggerRecord};
use keiho_core::trigger::port::TriggerLog;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

type TriggerRow = (String, String, String, f64, String, i64, String);

/// # Summary
/// `TriggerLog` 的 SQLite 实现。
///
/// # Invariants
/// * 时间以 UTC 毫秒整数存储，窗口比较不依赖文本格式。
/// * 条件追加是单条 `INSERT ... SELECT ... WHERE NOT EXISTS` 语句，
///   在 SQLite 写锁下原子执行，多进程共享库文件时同样成立。
pub struct SqliteTriggerLog {
    pool: SqlitePool,
}

impl SqliteTriggerLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// # Summary
    /// 按时间倒序列出某预警的全部触发记录。
    pub async fn list_for_alert(&self, alert_id: &str) -> Result<Vec<TriggerRecord>, StoreError> {
        let rows = sqlx::query_as::<_, TriggerRow>(
            r#"
            SELECT id, alert_id, ticker, price, direction, triggered_at_ms, delivery
            FROM alert_triggers WHERE alert_id = ? ORDER BY triggered_at_ms DESC
            "#,
        )
        .bind(alert_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.into_iter().map(row_to_record).collect()
    }
}

fn row_to_record(row: TriggerRow) -> Result<TriggerRecord, StoreError> {
    let triggered_at = DateTime::<Utc>::from_timestamp_millis(row.5)
        .ok_or_else(|| StoreError::Corrupt(format!("triggered_at_ms out of range: {}", row.5)))?;
    Ok(TriggerRecord {
        id: row.0,
        alert_id: row.1,
        ticker: row.2,
        price: row.3,
        direction: row.4.parse().map_err(StoreError::Corrupt)?,
        triggered_at,
        delivery: row.6.parse().map_err(StoreError::Corrupt)?,
    })
}

#[async_trait]
impl TriggerLog for SqliteTriggerLog {
    async fn recent_trigger(
        &self,
        alert_id: &str,
        within: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<TriggerRecord>, StoreError> {
        let floor_ms = (now - within).timestamp_millis();
        sqlx::query_as::<_, TriggerRow>(
            r#"
            SELECT id, alert_id, ticker, price, direction, triggered_at_ms, delivery
            FROM alert_triggers
            WHERE alert_id = ? AND triggered_at_ms > ?
            ORDER BY triggered_at_ms DESC LIMIT 1
            "#,
        )
        .bind(alert_id)
        .bind(floor_ms)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?
        .map(row_to_record)
        .transpose()
    }

    /// # Summary
    /// 条件写入触发记录。
    ///
    /// # Logic
    /// 1. 生成记录 ID，计算窗口下界 `triggered_at - window`。
    /// 2. 单条语句完成“窗口内无记录才插入”。
    /// 3. 受影响行数为 0 即判定为重复。
    async fn append(
        &self,
        draft: &TriggerDraft,
        window: Duration,
    ) -> Result<AppendOutcome, StoreError> {
        let id = Uuid::new_v4().to_string();
        let at_ms = draft.triggered_at.timestamp_millis();
        let floor_ms = (draft.triggered_at - window).timestamp_millis();

        let result = sqlx::query(
            r#"
            INSERT INTO alert_triggers
            (id, alert_id, ticker, price, direction, triggered_at_ms, delivery)
            SELECT ?, ?, ?, ?, ?, ?, 'pending'
            WHERE NOT EXISTS (
                SELECT 1 FROM alert_triggers WHERE alert_id = ? AND triggered_at_ms > ?
            )
            "#,
        )
        .bind(&id)
        .bind(&draft.alert_id)
        .bind(&draft.ticker)
        .bind(draft.price)
        .bind(draft.direction.to_string())
        .bind(at_ms)
        .bind(&draft.alert_id)
        .bind(floor_ms)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            debug!(alert_id = %draft.alert_id, "Trigger append skipped, window already occupied");
            return Ok(AppendOutcome::Duplicate);
        }

        Ok(AppendOutcome::Inserted(TriggerRecord {
            id,
            alert_id: draft.alert_id.clone(),
            ticker: draft.ticker.clone(),
            price: draft.price,
            direction: draft.direction,
            triggered_at: draft.triggered_at,
            delivery: DeliveryStatus::Pending,
        }))
    }

    async fn mark_delivery(
        &self,
        trigger_id: &str,
        status: DeliveryStatus,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE alert_triggers SET delivery = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(trigger_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
