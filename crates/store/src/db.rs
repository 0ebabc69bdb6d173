use keiho_core::store::error::StoreError;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// # Summary
/// 打开（必要时创建）预警数据库并初始化表结构。
///
/// # Logic
/// 1. 确保父目录存在。
/// 2. 开启 WAL 与 5 秒忙等待，允许多进程共享同一库文件。
/// 3. 执行 DDL 初始化全部表与索引。
///
/// # Arguments
/// * `db_path` - 数据库文件路径。
///
/// # Returns
/// * `Result<SqlitePool, StoreError>` - 共享连接池。
pub async fn connect(db_path: &Path) -> Result<SqlitePool, StoreError> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StoreError::InitError(e.to_string()))?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .connect_with(options)
        .await
        .map_err(|e| StoreError::InitError(e.to_string()))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS alerts (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            ticker TEXT NOT NULL,
            direction TEXT NOT NULL,
            threshold REAL NOT NULL,
            timeframe TEXT NOT NULL,
            tag TEXT,
            note TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            created_at DATETIME NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_alerts_active ON alerts (active, ticker);

        CREATE TABLE IF NOT EXISTS alert_triggers (
            id TEXT PRIMARY KEY,
            alert_id TEXT NOT NULL,
            ticker TEXT NOT NULL,
            price REAL NOT NULL,
            direction TEXT NOT NULL,
            triggered_at_ms INTEGER NOT NULL,
            delivery TEXT NOT NULL DEFAULT 'pending'
        );

        CREATE INDEX IF NOT EXISTS idx_alert_triggers_alert_time
            ON alert_triggers (alert_id, triggered_at_ms);

        CREATE TABLE IF NOT EXISTS broker_credentials (
            user_id TEXT NOT NULL,
            access_token TEXT NOT NULL,
            account_id TEXT NOT NULL,
            updated_at DATETIME NOT NULL,
            PRIMARY KEY (user_id, account_id)
        );

        CREATE TABLE IF NOT EXISTS user_contacts (
            user_id TEXT PRIMARY KEY,
            email TEXT,
            phone TEXT,
            email_enabled INTEGER NOT NULL DEFAULT 1,
            sms_enabled INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )
    .execute(&pool)
    .await
    .map_err(|e| StoreError::InitError(e.to_string()))?;

    info!("Alert database ready at {}", db_path.display());
    Ok(pool)
}

/// 以存储层根目录下的默认库文件建立连接。
pub async fn connect_default() -> Result<SqlitePool, StoreError> {
    connect(&crate::config::default_db_path()).await
}
