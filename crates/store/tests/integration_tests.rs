use chrono::{Duration, TimeZone, Utc};
use keiho_core::account::entity::{BrokerCredential, UserContact};
use keiho_core::account::port::AccountStore;
use keiho_core::alert::entity::{Alert, Direction};
use keiho_core::alert::port::AlertRepository;
use keiho_core::common::TimeFrame;
use keiho_core::store::error::StoreError;
use keiho_core::trigger::entity::{AppendOutcome, DeliveryStatus, TriggerDraft};
use keiho_core::trigger::port::TriggerLog;
use keiho_store::account::SqliteAccountStore;
use keiho_store::alert::SqliteAlertStore;
use keiho_store::db;
use keiho_store::trigger::SqliteTriggerLog;
use std::sync::Arc;
use tempfile::tempdir;

fn alert(id: &str, ticker: &str, created_secs: i64, active: bool) -> Alert {
    Alert {
        id: id.to_string(),
        user_id: "u1".to_string(),
        ticker: ticker.to_string(),
        direction: Direction::Above,
        threshold: 12345.0,
        timeframe: TimeFrame::Minute5,
        tag: Some("2σ".to_string()),
        note: None,
        active,
        created_at: Utc.timestamp_opt(1_700_000_000 + created_secs, 0).unwrap(),
    }
}

fn draft(alert_id: &str, at_secs: i64) -> TriggerDraft {
    TriggerDraft {
        alert_id: alert_id.to_string(),
        ticker: "MNQ".to_string(),
        price: 12345.5,
        direction: Direction::Above,
        triggered_at: Utc.timestamp_opt(1_700_000_000 + at_secs, 0).unwrap(),
    }
}

#[tokio::test]
async fn test_alert_store_loads_only_active_in_order() {
    let tmp_dir = tempdir().expect("Failed to create temp dir");
    let pool = db::connect(&tmp_dir.path().join("keiho.db")).await.unwrap();
    let store = SqliteAlertStore::new(pool);

    store.save_alert(&alert("b", "MNQ", 10, true)).await.unwrap();
    store.save_alert(&alert("a", "ES", 20, true)).await.unwrap();
    store.save_alert(&alert("c", "MNQ", 5, false)).await.unwrap();

    let loaded = store.load_active().await.unwrap();
    let ids: Vec<&str> = loaded.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
    assert_eq!(loaded[0].timeframe, TimeFrame::Minute5);
    assert_eq!(loaded[0].tag.as_deref(), Some("2σ"));

    store.set_active("b", false).await.unwrap();
    let loaded = store.load_active().await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].id, "a");

    assert!(matches!(
        store.set_active("missing", true).await,
        Err(StoreError::NotFound)
    ));
}

#[tokio::test]
async fn test_alert_store_skips_malformed_rows() {
    let tmp_dir = tempdir().unwrap();
    let pool = db::connect(&tmp_dir.path().join("keiho.db")).await.unwrap();
    let store = SqliteAlertStore::new(pool.clone());

    store.save_alert(&alert("good", "MNQ", 10, true)).await.unwrap();
    // 外部写入层留下的未知周期与未知方向
    for (id, direction, timeframe) in [("bad-tf", "above", "weekly"), ("bad-dir", "sideways", "5min")] {
        sqlx::query(
            r#"
            INSERT INTO alerts
            (id, user_id, ticker, direction, threshold, timeframe, tag, note, active, created_at)
            VALUES (?, 'u1', 'ES', ?, 5000.0, ?, NULL, NULL, 1, ?)
            "#,
        )
        .bind(id)
        .bind(direction)
        .bind(timeframe)
        .bind(Utc.timestamp_opt(1_700_000_000, 0).unwrap())
        .execute(&pool)
        .await
        .unwrap();
    }

    let loaded = store.load_active().await.unwrap();
    let ids: Vec<&str> = loaded.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["good"]);
}

#[tokio::test]
async fn test_trigger_log_conditional_append() {
    let tmp_dir = tempdir().unwrap();
    let pool = db::connect(&tmp_dir.path().join("keiho.db")).await.unwrap();
    let log = SqliteTriggerLog::new(pool);
    let window = TimeFrame::Minute5.min_interval();

    let first = log.append(&draft("a1", 0), window).await.unwrap();
    let record = match first {
        AppendOutcome::Inserted(r) => r,
        AppendOutcome::Duplicate => panic!("first append must insert"),
    };
    assert_eq!(record.delivery, DeliveryStatus::Pending);

    // 窗口内第二次写入被拒绝
    let second = log.append(&draft("a1", 120), window).await.unwrap();
    assert_eq!(second, AppendOutcome::Duplicate);

    // 其他预警不受影响
    let other = log.append(&draft("a2", 120), window).await.unwrap();
    assert!(matches!(other, AppendOutcome::Inserted(_)));

    // 恰好一个最小间隔之后允许再次写入
    let later = log.append(&draft("a1", 300), window).await.unwrap();
    assert!(matches!(later, AppendOutcome::Inserted(_)));

    let history = log.list_for_alert("a1").await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].triggered_at > history[1].triggered_at);
}

#[tokio::test]
async fn test_trigger_log_recent_and_delivery() {
    let tmp_dir = tempdir().unwrap();
    let pool = db::connect(&tmp_dir.path().join("keiho.db")).await.unwrap();
    let log = SqliteTriggerLog::new(pool);

    let inserted = match log.append(&draft("a1", 0), Duration::minutes(15)).await.unwrap() {
        AppendOutcome::Inserted(r) => r,
        AppendOutcome::Duplicate => panic!("expected insert"),
    };

    let now = Utc.timestamp_opt(1_700_000_000 + 600, 0).unwrap();
    let recent = log
        .recent_trigger("a1", Duration::minutes(15), now)
        .await
        .unwrap()
        .expect("record within 15 minutes");
    assert_eq!(recent.id, inserted.id);
    assert_eq!(recent.price, 12345.5);

    let none = log
        .recent_trigger("a1", Duration::minutes(5), now)
        .await
        .unwrap();
    assert!(none.is_none());

    log.mark_delivery(&inserted.id, DeliveryStatus::Partial)
        .await
        .unwrap();
    let history = log.list_for_alert("a1").await.unwrap();
    assert_eq!(history[0].delivery, DeliveryStatus::Partial);

    assert!(matches!(
        log.mark_delivery("missing", DeliveryStatus::Delivered).await,
        Err(StoreError::NotFound)
    ));
}

#[tokio::test]
async fn test_trigger_log_concurrent_appends_insert_once() {
    let tmp_dir = tempdir().unwrap();
    let pool = db::connect(&tmp_dir.path().join("keiho.db")).await.unwrap();
    let log = Arc::new(SqliteTriggerLog::new(pool));

    let mut handles = Vec::new();
    for i in 0..8 {
        let log = log.clone();
        handles.push(tokio::spawn(async move {
            log.append(&draft("race", i), Duration::minutes(5)).await
        }));
    }

    let mut inserted = 0;
    for h in handles {
        if let AppendOutcome::Inserted(_) = h.await.unwrap().unwrap() {
            inserted += 1;
        }
    }
    assert_eq!(inserted, 1);
    assert_eq!(log.list_for_alert("race").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_account_store_latest_credential_and_contact() {
    let tmp_dir = tempdir().unwrap();
    let pool = db::connect(&tmp_dir.path().join("keiho.db")).await.unwrap();
    let store = SqliteAccountStore::new(pool);

    assert!(store.credential("u1").await.unwrap().is_none());

    store
        .save_credential(&BrokerCredential {
            user_id: "u1".into(),
            access_token: "old".into(),
            account_id: "ACC-1".into(),
            updated_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        })
        .await
        .unwrap();
    store
        .save_credential(&BrokerCredential {
            user_id: "u1".into(),
            access_token: "new".into(),
            account_id: "ACC-2".into(),
            updated_at: Utc.timestamp_opt(1_700_000_100, 0).unwrap(),
        })
        .await
        .unwrap();

    let credential = store.credential("u1").await.unwrap().unwrap();
    assert_eq!(credential.access_token, "new");
    assert_eq!(credential.account_id, "ACC-2");

    store
        .save_contact(&UserContact {
            user_id: "u1".into(),
            email: Some("trader@example.com".into()),
            phone: None,
            email_enabled: true,
            sms_enabled: false,
        })
        .await
        .unwrap();
    let contact = store.contact("u1").await.unwrap().unwrap();
    assert_eq!(contact.email.as_deref(), Some("trader@example.com"));
    assert!(contact.phone.is_none());
    assert!(!contact.sms_enabled);
}
