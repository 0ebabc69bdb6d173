use chrono::{DateTime, Duration, TimeZone, Utc};
use keiho_core::alert::entity::{AlertState, Direction};
use keiho_core::common::TimeFrame;
use keiho_core::market::entity::PriceSnapshot;
use keiho_core::test_utils::{MemTriggerLog, sample_alert};
use keiho_core::trigger::entity::{DeliveryStatus, TriggerRecord};
use keiho_engine::clock::CandleClock;
use keiho_engine::evaluator::{AlertEvaluator, Evaluation};
use std::sync::Arc;

fn quote(ticker: &str, last: f64) -> PriceSnapshot {
    PriceSnapshot {
        ticker: ticker.to_string(),
        user_id: "u1".to_string(),
        last,
        high: last,
        low: last,
        fetched_at: Utc::now(),
    }
}

// 2024-06-11 (周二) 14:35:00Z，恰为 5 分钟桶起点
fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 11, 14, 35, 0).unwrap()
}

fn setup() -> (AlertEvaluator, Arc<MemTriggerLog>) {
    let log = Arc::new(MemTriggerLog::new());
    (AlertEvaluator::new(CandleClock::default(), log.clone()), log)
}

/// # Summary
/// MNQ 场景：第一个快照未达阈值，下一个桶的快照触发，触发价为 12345.5。
#[tokio::test]
async fn test_mnq_crosses_in_next_bucket() {
    let (ev, log) = setup();
    let alert = sample_alert("mnq", "u1", "MNQ", Direction::Above, 12345.0, TimeFrame::Minute5);
    let mut state = AlertState::default();

    let first = ev.evaluate(&alert, &mut state, &quote("MNQ", 12344.9), t0()).await;
    assert_eq!(first, Evaluation::Held);
    assert_eq!(state.last_observed_price, Some(12344.9));

    let next_bucket = t0() + Duration::minutes(5);
    let second = ev.evaluate(&alert, &mut state, &quote("MNQ", 12345.5), next_bucket).await;
    let Evaluation::Fired(record) = second else {
        panic!("expected fire, got {:?}", second);
    };
    assert_eq!(record.price, 12345.5);
    assert_eq!(record.triggered_at, next_bucket);
    assert_eq!(record.delivery, DeliveryStatus::Pending);
    assert!(!state.is_armed());
    assert_eq!(log.records_for("mnq").len(), 1);
}

/// # Summary
/// 100.00 阈值的包含边界：above 在 100.00 触发、99.99 不触发；below 对称。
#[tokio::test]
async fn test_inclusive_threshold_boundaries() {
    let (ev, log) = setup();

    let above = sample_alert("up", "u1", "T", Direction::Above, 100.00, TimeFrame::Minute15);
    let mut state = AlertState::default();
    assert_eq!(ev.evaluate(&above, &mut state, &quote("T", 99.99), t0()).await, Evaluation::Held);
    assert!(matches!(
        ev.evaluate(&above, &mut state, &quote("T", 100.00), t0()).await,
        Evaluation::Fired(_)
    ));

    let below = sample_alert("down", "u1", "T", Direction::Below, 100.00, TimeFrame::Minute15);
    let mut state = AlertState::default();
    assert_eq!(ev.evaluate(&below, &mut state, &quote("T", 100.01), t0()).await, Evaluation::Held);
    assert!(matches!(
        ev.evaluate(&below, &mut state, &quote("T", 100.00), t0()).await,
        Evaluation::Fired(_)
    ));

    assert_eq!(log.records().len(), 2);
}

/// # Summary
/// 同一桶内两次满足条件的评估只产生一条触发记录；价格在桶内反复穿越也不再触发。
#[tokio::test]
async fn test_single_fire_per_bucket_despite_oscillation() {
    let (ev, log) = setup();
    let alert = sample_alert("osc", "u1", "ES", Direction::Above, 5000.0, TimeFrame::Minute5);
    let mut state = AlertState::default();

    assert!(matches!(
        ev.evaluate(&alert, &mut state, &quote("ES", 5001.0), t0()).await,
        Evaluation::Fired(_)
    ));

    for (offset, price) in [(30, 5002.0), (60, 4990.0), (120, 5005.0), (240, 4999.0), (290, 5010.0)] {
        let out = ev
            .evaluate(&alert, &mut state, &quote("ES", price), t0() + Duration::seconds(offset))
            .await;
        assert_eq!(out, Evaluation::Held, "offset {}s", offset);
    }
    assert_eq!(log.records_for("osc").len(), 1);
    assert_eq!(state.last_observed_price, Some(5010.0));

    // 下一个桶重新武装并再次触发
    let out = ev
        .evaluate(&alert, &mut state, &quote("ES", 5003.0), t0() + Duration::minutes(5))
        .await;
    assert!(matches!(out, Evaluation::Fired(_)));
    assert_eq!(log.records_for("osc").len(), 2);
}

/// # Summary
/// 模拟进程重启：内存状态全新，但触发日志中已有窗口内记录，不得再次派发。
#[tokio::test]
async fn test_restart_dedupes_against_log() {
    let (ev, log) = setup();
    let alert = sample_alert("r1", "u1", "NQ", Direction::Below, 18000.0, TimeFrame::Hour1);
    log.seed(TriggerRecord {
        id: "before-restart".into(),
        alert_id: "r1".into(),
        ticker: "NQ".into(),
        price: 17990.0,
        direction: Direction::Below,
        triggered_at: t0() - Duration::minutes(20),
        delivery: DeliveryStatus::Delivered,
    });

    let mut fresh = AlertState::default();
    let out = ev.evaluate(&alert, &mut fresh, &quote("NQ", 17950.0), t0()).await;

    assert_eq!(out, Evaluation::Deduplicated);
    assert!(!fresh.is_armed());
    assert_eq!(log.records_for("r1").len(), 1);
}

/// # Summary
/// 触发日志不可用时不派发，预警保持 ARMED，恢复后下一次轮询正常触发。
#[tokio::test]
async fn test_store_failure_keeps_alert_armed() {
    let (ev, log) = setup();
    let alert = sample_alert("sf", "u1", "CL", Direction::Above, 80.0, TimeFrame::Minute30);
    let mut state = AlertState::default();

    log.set_failing(true);
    let out = ev.evaluate(&alert, &mut state, &quote("CL", 81.0), t0()).await;
    assert_eq!(out, Evaluation::StoreFailed);
    assert!(state.is_armed());

    log.set_failing(false);
    let out = ev
        .evaluate(&alert, &mut state, &quote("CL", 81.5), t0() + Duration::seconds(10))
        .await;
    assert!(matches!(out, Evaluation::Fired(_)));
    assert_eq!(log.records_for("sf").len(), 1);
}

/// # Summary
/// 畸形快照（NaN）不改变状态，也不产生触发记录。
#[tokio::test]
async fn test_nan_snapshot_is_skipped() {
    let (ev, log) = setup();
    let alert = sample_alert("nan", "u1", "GC", Direction::Above, 1.0, TimeFrame::Day1);
    let mut state = AlertState::default();

    let out = ev.evaluate(&alert, &mut state, &quote("GC", f64::NAN), t0()).await;
    assert_eq!(out, Evaluation::Skipped);
    assert_eq!(state, AlertState::default());
    assert!(log.records().is_empty());
}
