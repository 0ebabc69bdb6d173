//! # 测试辅助
//!
//! 各端口的内存实现，供下游 crate 的集成测试注入使用。
//! 仅在启用 `test-utils` feature 时编译。

use crate::account::entity::{BrokerCredential, UserContact};
use crate::account::port::AccountStore;
use crate::alert::entity::{Alert, Direction};
use crate::alert::port::AlertRepository;
use crate::common::TimeFrame;
use crate::market::entity::PriceSnapshot;
use crate::market::error::MarketError;
use crate::market::port::PriceSource;
use crate::notify::error::NotifyError;
use crate::notify::port::{Channel, Notifier};
use crate::store::error::StoreError;
use crate::trigger::entity::{AppendOutcome, DeliveryStatus, TriggerDraft, TriggerRecord};
use crate::trigger::port::TriggerLog;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// # Summary
/// 构造一条启用中的预警。
pub fn sample_alert(
    id: &str,
    user_id: &str,
    ticker: &str,
    direction: Direction,
    threshold: f64,
    timeframe: TimeFrame,
) -> Alert {
    Alert {
        id: id.to_string(),
        user_id: user_id.to_string(),
        ticker: ticker.to_string(),
        direction,
        threshold,
        timeframe,
        tag: None,
        note: None,
        active: true,
        created_at: DateTime::<Utc>::UNIX_EPOCH,
    }
}

// ============================================================
//  AlertRepository
// ============================================================

/// # Summary
/// 基于 `Vec` 的预警仓库，可模拟读取失败。
#[derive(Default)]
pub struct MemAlertRepository {
    alerts: Mutex<Vec<Alert>>,
    failing: AtomicBool,
}

impl MemAlertRepository {
    pub fn new(alerts: Vec<Alert>) -> Self {
        Self {
            alerts: Mutex::new(alerts),
            failing: AtomicBool::new(false),
        }
    }

    /// 插入或按 ID 覆盖
    pub fn upsert(&self, alert: Alert) {
        let mut alerts = self.alerts.lock().unwrap_or_else(|e| e.into_inner());
        match alerts.iter_mut().find(|a| a.id == alert.id) {
            Some(slot) => *slot = alert,
            None => alerts.push(alert),
        }
    }

    /// 停用指定预警
    pub fn deactivate(&self, id: &str) {
        let mut alerts = self.alerts.lock().unwrap_or_else(|e| e.into_inner());
        for a in alerts.iter_mut().filter(|a| a.id == id) {
            a.active = false;
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl AlertRepository for MemAlertRepository {
    async fn load_active(&self) -> Result<Vec<Alert>, StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Database("alert repository unavailable".into()));
        }
        let alerts = self.alerts.lock().unwrap_or_else(|e| e.into_inner());
        let mut active: Vec<Alert> = alerts.iter().filter(|a| a.active).cloned().collect();
        active.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(active)
    }
}

// ============================================================
//  TriggerLog
// ============================================================

/// # Summary
/// 内存触发日志。条件追加在同一把锁内完成检查与插入。
#[derive(Default)]
pub struct MemTriggerLog {
    records: Mutex<Vec<TriggerRecord>>,
    failing: AtomicBool,
}

impl MemTriggerLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前全部记录的副本
    pub fn records(&self) -> Vec<TriggerRecord> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// 指定预警的记录
    pub fn records_for(&self, alert_id: &str) -> Vec<TriggerRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.alert_id == alert_id)
            .collect()
    }

    /// 直接写入一条历史记录（模拟重启前已触发）
    pub fn seed(&self, record: TriggerRecord) {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Database("trigger log unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl TriggerLog for MemTriggerLog {
    async fn recent_trigger(
        &self,
        alert_id: &str,
        within: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<TriggerRecord>, StoreError> {
        self.check_available()?;
        let floor = now - within;
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(records
            .iter()
            .filter(|r| r.alert_id == alert_id && r.triggered_at > floor)
            .max_by_key(|r| r.triggered_at)
            .cloned())
    }

    async fn append(
        &self,
        draft: &TriggerDraft,
        window: Duration,
    ) -> Result<AppendOutcome, StoreError> {
        self.check_available()?;
        let floor = draft.triggered_at - window;
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        if records
            .iter()
            .any(|r| r.alert_id == draft.alert_id && r.triggered_at > floor)
        {
            return Ok(AppendOutcome::Duplicate);
        }
        let record = TriggerRecord {
            id: uuid::Uuid::new_v4().to_string(),
            alert_id: draft.alert_id.clone(),
            ticker: draft.ticker.clone(),
            price: draft.price,
            direction: draft.direction,
            triggered_at: draft.triggered_at,
            delivery: DeliveryStatus::Pending,
        };
        records.push(record.clone());
        Ok(AppendOutcome::Inserted(record))
    }

    async fn mark_delivery(
        &self,
        trigger_id: &str,
        status: DeliveryStatus,
    ) -> Result<(), StoreError> {
        self.check_available()?;
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let record = records
            .iter_mut()
            .find(|r| r.id == trigger_id)
            .ok_or(StoreError::NotFound)?;
        record.delivery = status;
        Ok(())
    }
}

// ============================================================
//  PriceSource
// ============================================================

/// # Summary
/// 可编排的行情源：按标的设置价格、失败或延迟，按用户拒绝凭证。
#[derive(Default)]
pub struct MockPriceSource {
    // ticker -> (last, high, low)
    quotes: DashMap<String, (f64, f64, f64)>,
    failing: DashMap<String, ()>,
    denied_users: DashMap<String, ()>,
    delay: Mutex<Option<std::time::Duration>>,
    // 每次调用的 (ticker, user_id)
    calls: Mutex<Vec<(String, String)>>,
}

impl MockPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置最新价，最高/最低价与之相同
    pub fn set_price(&self, ticker: &str, last: f64) {
        self.quotes.insert(ticker.to_string(), (last, last, last));
    }

    /// 设置完整快照字段，可用于注入 NaN 等畸形数据
    pub fn set_quote(&self, ticker: &str, last: f64, high: f64, low: f64) {
        self.quotes.insert(ticker.to_string(), (last, high, low));
    }

    /// 让指定标的的抓取失败
    pub fn fail_ticker(&self, ticker: &str) {
        self.failing.insert(ticker.to_string(), ());
    }

    pub fn recover_ticker(&self, ticker: &str) {
        self.failing.remove(ticker);
    }

    /// 让指定用户的凭证被拒绝
    pub fn deny_user(&self, user_id: &str) {
        self.denied_users.insert(user_id.to_string(), ());
    }

    /// 每次抓取前等待的时长
    pub fn set_delay(&self, delay: std::time::Duration) {
        *self.delay.lock().unwrap_or_else(|e| e.into_inner()) = Some(delay);
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self, ticker: &str) -> usize {
        self.calls().iter().filter(|(t, _)| t == ticker).count()
    }
}

#[async_trait]
impl PriceSource for MockPriceSource {
    async fn fetch(&self, ticker: &str, user_id: &str) -> Result<PriceSnapshot, MarketError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((ticker.to_string(), user_id.to_string()));

        let delay = *self.delay.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }

        if self.denied_users.contains_key(user_id) {
            return Err(MarketError::Credential(format!("token rejected for {}", user_id)));
        }
        if self.failing.contains_key(ticker) {
            return Err(MarketError::Network("connection reset".into()));
        }
        let (last, high, low) = self
            .quotes
            .get(ticker)
            .map(|q| *q.value())
            .ok_or(MarketError::NotFound)?;

        Ok(PriceSnapshot {
            ticker: ticker.to_string(),
            user_id: user_id.to_string(),
            last,
            high,
            low,
            fetched_at: Utc::now(),
        })
    }
}

// ============================================================
//  AccountStore
// ============================================================

#[derive(Default)]
pub struct MemAccountStore {
    credentials: DashMap<String, BrokerCredential>,
    contacts: DashMap<String, UserContact>,
}

impl MemAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_credential(&self, credential: BrokerCredential) {
        self.credentials
            .insert(credential.user_id.clone(), credential);
    }

    pub fn put_contact(&self, contact: UserContact) {
        self.contacts.insert(contact.user_id.clone(), contact);
    }
}

#[async_trait]
impl AccountStore for MemAccountStore {
    async fn credential(&self, user_id: &str) -> Result<Option<BrokerCredential>, StoreError> {
        Ok(self.credentials.get(user_id).map(|c| c.value().clone()))
    }

    async fn contact(&self, user_id: &str) -> Result<Option<UserContact>, StoreError> {
        Ok(self.contacts.get(user_id).map(|c| c.value().clone()))
    }
}

// ============================================================
//  Notifier
// ============================================================

/// 一条已“发送”的消息
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub recipient: String,
    pub subject: String,
    pub content: String,
}

/// # Summary
/// 记录所有发送请求的通知渠道，可模拟发送失败。
pub struct RecordingNotifier {
    channel: Channel,
    sent: Mutex<Vec<SentMessage>>,
    failing: AtomicBool,
    delay: Mutex<Option<std::time::Duration>>,
}

impl RecordingNotifier {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            sent: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            delay: Mutex::new(None),
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// 每次发送前等待的时长，模拟慢速网关
    pub fn set_delay(&self, delay: std::time::Duration) {
        *self.delay.lock().unwrap_or_else(|e| e.into_inner()) = Some(delay);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn notify(
        &self,
        recipient: &str,
        subject: &str,
        content: &str,
    ) -> Result<(), NotifyError> {
        let delay = *self.delay.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Network(format!("{} channel down", self.channel)));
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SentMessage {
                recipient: recipient.to_string(),
                subject: subject.to_string(),
                content: content.to_string(),
            });
        Ok(())
    }
}
