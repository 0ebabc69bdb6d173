use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keiho_core::alert::entity::Alert;
use keiho_core::alert::port::AlertRepository;
use keiho_core::store::error::StoreError;
use sqlx::SqlitePool;
use tracing::warn;

type AlertRow = (
    String,
    String,
    String,
    String,
    f64,
    String,
    Option<String>,
    Option<String>,
    bool,
    DateTime<Utc>,
);

/// # Summary
/// `AlertRepository` 的 SQLite 实现。
///
/// # Invariants
/// * 表结构由 `db::connect` 初始化。
/// * 写接口只服务于种子数据与测试，引擎本身只读。
pub struct SqliteAlertStore {
    pool: SqlitePool,
}

impl SqliteAlertStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// # Summary
    /// 保存或覆盖一条预警。
    ///
    /// # Logic
    /// 在 `alerts` 表上执行 `INSERT OR REPLACE`。
    pub async fn save_alert(&self, alert: &Alert) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO alerts
            (id, user_id, ticker, direction, threshold, timeframe, tag, note, active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&alert.id)
        .bind(&alert.user_id)
        .bind(&alert.ticker)
        .bind(alert.direction.to_string())
        .bind(alert.threshold)
        .bind(alert.timeframe.to_string())
        .bind(&alert.tag)
        .bind(&alert.note)
        .bind(alert.active)
        .bind(alert.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    /// # Summary
    /// 启用或停用预警。
    ///
    /// # Returns
    /// * 预警不存在时返回 `StoreError::NotFound`。
    pub async fn set_active(&self, id: &str, active: bool) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE alerts SET active = ? WHERE id = ?")
            .bind(active)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

fn row_to_alert(row: AlertRow) -> Result<Alert, StoreError> {
    Ok(Alert {
        id: row.0,
        user_id: row.1,
        ticker: row.2,
        direction: row.3.parse().map_err(StoreError::Corrupt)?,
        threshold: row.4,
        timeframe: row.5.parse().map_err(StoreError::Corrupt)?,
        tag: row.6,
        note: row.7,
        active: row.8,
        created_at: row.9,
    })
}

#[async_trait]
impl AlertRepository for SqliteAlertStore {
    /// # Summary
    /// 加载全部启用中的预警。
    ///
    /// # Logic
    /// 1. 按 `created_at, id` 排序查询 `active = 1` 的记录。
    /// 2. 无法还原为领域类型的行（未知周期、方向等）逐行跳过并告警，不影响其余预警。
    /// 3. 只有查询本身失败才返回错误。
    async fn load_active(&self) -> Result<Vec<Alert>, StoreError> {
        let rows = sqlx::query_as::<_, AlertRow>(
            r#"
            SELECT id, user_id, ticker, direction, threshold, timeframe, tag, note, active, created_at
            FROM alerts WHERE active = 1 ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut alerts = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.0.clone();
            match row_to_alert(row) {
                Ok(alert) => alerts.push(alert),
                Err(e) => warn!(alert_id = %id, error = %e, "Skipping malformed alert row"),
            }
        }
        Ok(alerts)
    }
}
