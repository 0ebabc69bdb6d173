use crate::book::ReloadStats;
use crate::clock::CandleClock;
use crate::dispatcher::{DispatchJob, NotificationDispatcher};
use crate::error::EngineError;
use crate::evaluator::{AlertEvaluator, Evaluation};
use crate::index::AlertIndex;
use futures::StreamExt;
use keiho_core::account::port::AccountStore;
use keiho_core::alert::entity::{Alert, AlertState};
use keiho_core::alert::port::AlertRepository;
use keiho_core::common::time::TimeProvider;
use keiho_core::config::EngineConfig;
use keiho_core::market::entity::PriceSnapshot;
use keiho_core::market::error::MarketError;
use keiho_core::market::port::PriceSource;
use keiho_core::notify::port::Notifier;
use keiho_core::trigger::port::TriggerLog;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// # Summary
/// 触发评估轮次的来源。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    // 快速轮询
    Fast,
    // 对账轮询（先重载再评估）
    Reconcile,
}

impl std::fmt::Display for PassKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PassKind::Fast => write!(f, "fast"),
            PassKind::Reconcile => write!(f, "reconcile"),
        }
    }
}

/// # Summary
/// 一轮评估的汇总。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    // 参与本轮的标的数
    pub tickers: usize,
    // 抓取失败（含快照不可用）而被跳过的标的数
    pub fetch_failures: usize,
    // 实际完成评估的预警数
    pub evaluated: usize,
    // 新触发并已交给派发器的预警数
    pub fired: usize,
    // 因触发日志已有记录而只标记、不派发的预警数
    pub deduplicated: usize,
    // 触发日志读写失败的预警数
    pub store_failures: usize,
}

/// # Summary
/// 引擎依赖的外部端口集合，由 App 层注入具体实现。
pub struct EnginePorts {
    pub alerts: Arc<dyn AlertRepository>,
    pub triggers: Arc<dyn TriggerLog>,
    pub source: Arc<dyn PriceSource>,
    pub accounts: Arc<dyn AccountStore>,
    pub sms: Option<Arc<dyn Notifier>>,
    pub email: Option<Arc<dyn Notifier>>,
    pub time: Arc<dyn TimeProvider>,
}

/// # Summary
/// 价格预警引擎：在单一互斥闸门下执行“重载 / 评估”，并把触发交给派发协程。
///
/// # Invariants
/// - 闸门内持有整个 `AlertIndex`，任意时刻最多一个评估轮次或重载在执行。
/// - 定时触发的轮次使用 `try_lock`，闸门被占用时直接丢弃，不排队。
/// - 显式 `refresh` 等待闸门，从不丢弃。
/// - 派发通过有界队列异步完成，评估循环从不等待通知发送。
/// - `shutdown` 之后队列关闭，新触发仍会落库但不再派发。
pub struct AlertEngine {
    gate: Mutex<AlertIndex>,
    evaluator: AlertEvaluator,
    source: Arc<dyn PriceSource>,
    // 派发队列发送端，`shutdown` 时取走并关闭
    dispatch_tx: std::sync::Mutex<Option<mpsc::Sender<DispatchJob>>>,
    dispatcher: std::sync::Mutex<Option<JoinHandle<()>>>,
    time: Arc<dyn TimeProvider>,
    fetch_concurrency: usize,
}

impl AlertEngine {
    /// # Summary
    /// 构造引擎并启动派发协程。
    ///
    /// # Logic
    /// 1. 由配置构造分桶时钟，配置非法则返回错误。
    /// 2. 创建有界派发队列，`tokio::spawn` 派发协程消费它。
    /// 3. 索引初始为空，首次 `refresh` 或对账轮次才会载入预警。
    ///
    /// # Arguments
    /// * `ports` - 外部端口。
    /// * `config` - 引擎配置。
    ///
    /// # Returns
    /// 返回引擎的共享指针。
    pub fn new(ports: EnginePorts, config: &EngineConfig) -> Result<Arc<Self>, EngineError> {
        let clock = CandleClock::from_config(config)?;
        let (tx, rx) = mpsc::channel(config.dispatch_queue.max(1));

        let dispatcher = Arc::new(NotificationDispatcher::new(
            ports.accounts,
            ports.sms,
            ports.email,
            ports.triggers.clone(),
        ));
        let worker = tokio::spawn(dispatcher.run(rx));

        Ok(Arc::new(Self {
            gate: Mutex::new(AlertIndex::new(ports.alerts)),
            evaluator: AlertEvaluator::new(clock, ports.triggers),
            source: ports.source,
            dispatch_tx: std::sync::Mutex::new(Some(tx)),
            dispatcher: std::sync::Mutex::new(Some(worker)),
            time: ports.time,
            fetch_concurrency: config.fetch_concurrency.max(1),
        }))
    }

    /// # Summary
    /// 执行一轮评估；已有轮次在执行时丢弃本次请求。
    ///
    /// # Returns
    /// 执行了则返回汇总，被丢弃返回 `None`。
    pub async fn run_pass(&self, kind: PassKind) -> Option<PassReport> {
        let Ok(mut index) = self.gate.try_lock() else {
            debug!(kind = %kind, "Evaluation pass already in flight, tick dropped");
            return None;
        };
        Some(self.pass_locked(&mut index, kind).await)
    }

    /// # Summary
    /// 对账轮次：重载预警后执行一轮评估，两步在同一闸门内完成。
    ///
    /// # Logic
    /// 重载失败只记录日志，继续用上一次成功的索引评估。
    pub async fn reconcile(&self) -> Option<PassReport> {
        let Ok(mut index) = self.gate.try_lock() else {
            debug!("Evaluation pass already in flight, reconcile tick dropped");
            return None;
        };
        if let Err(e) = index.reload().await {
            warn!(error = %e, "Reconcile reload failed, evaluating last-known-good alerts");
        }
        Some(self.pass_locked(&mut index, PassKind::Reconcile).await)
    }

    /// # Summary
    /// 立即重载预警定义（供外部 CRUD 层在增删改后调用）。
    ///
    /// # Logic
    /// 等待正在执行的轮次结束后再重载，保证不会与评估交错。
    pub async fn refresh(&self) -> Result<ReloadStats, EngineError> {
        let mut index = self.gate.lock().await;
        index.reload().await
    }

    /// # Summary
    /// 关闭派发队列并等待派发协程把已入队的通知发完。
    ///
    /// # Logic
    /// 1. 先等待闸门，保证进行中的评估轮次已把触发交给队列。
    /// 2. 丢弃发送端，派发协程处理完剩余任务后自然退出。
    /// 3. 最多等待 `grace`，超时则放弃等待并告警。
    /// 4. 重复调用时没有可等待的协程，直接返回 `true`。
    ///
    /// # Arguments
    /// * `grace` - 等待派发协程退出的上限。
    ///
    /// # Returns
    /// 派发协程在时限内退出返回 `true`。
    pub async fn shutdown(&self, grace: Duration) -> bool {
        let _gate = self.gate.lock().await;

        drop(
            self.dispatch_tx
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .take(),
        );
        let worker = self
            .dispatcher
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(worker) = worker else {
            return true;
        };

        match tokio::time::timeout(grace, worker).await {
            Ok(Ok(())) => {
                info!("Notification queue drained");
                true
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Notification dispatcher ended abnormally");
                true
            }
            Err(_) => {
                warn!(grace = ?grace, "Notification queue not drained in time, pending notifications abandoned");
                false
            }
        }
    }

    /// 某个预警当前的运行状态副本
    pub async fn alert_state(&self, alert_id: &str) -> Option<AlertState> {
        self.gate.lock().await.book().state(alert_id).cloned()
    }

    /// 当前索引中的预警数
    pub async fn alert_count(&self) -> usize {
        self.gate.lock().await.book().len()
    }

    /// # Summary
    /// 在已持有闸门的前提下执行一轮评估。
    ///
    /// # Logic
    /// 1. 取分组快照（`Arc`），没有预警的标的不会出现在其中。
    /// 2. 各标的并发抓取，并发度受 `fetch_concurrency` 限制。
    /// 3. 每个标的抓取完成后立刻按加载顺序逐个评估其预警。
    /// 4. 抓取失败的标的整体跳过，状态不变。
    /// 5. 新触发通过 `try_send` 交给派发协程，队列满则丢弃通知并告警。
    async fn pass_locked(&self, index: &mut AlertIndex, kind: PassKind) -> PassReport {
        let snapshot = index.book().snapshot_by_ticker();
        let mut report = PassReport {
            tickers: snapshot.len(),
            ..PassReport::default()
        };

        let fetch_futures: Vec<_> = snapshot
            .iter()
            .map(|(ticker, alerts)| {
                let owners = candidate_owners(alerts);
                async move {
                    let result = self.fetch_with_fallback(ticker, &owners).await;
                    (ticker, alerts, result)
                }
            })
            .collect();
        let mut fetches =
            futures::stream::iter(fetch_futures).buffer_unordered(self.fetch_concurrency);

        while let Some((ticker, alerts, result)) = fetches.next().await {
            let quote = match result {
                Ok(quote) => quote,
                Err(e) => {
                    report.fetch_failures += 1;
                    warn!(ticker = %ticker, error = %e, "Price fetch failed, skipping ticker this cycle");
                    continue;
                }
            };

            let now = self.time.now();
            for alert in alerts {
                let Some(state) = index.book_mut().state_mut(&alert.id) else {
                    continue;
                };
                let outcome = self.evaluator.evaluate(alert, state, &quote, now).await;
                report.evaluated += 1;
                match outcome {
                    Evaluation::Fired(record) => {
                        report.fired += 1;
                        self.hand_off(DispatchJob {
                            alert: Arc::clone(alert),
                            trigger_price: quote.last,
                            record,
                        });
                    }
                    Evaluation::Deduplicated => report.deduplicated += 1,
                    Evaluation::StoreFailed => report.store_failures += 1,
                    Evaluation::Held | Evaluation::Skipped => {}
                }
            }
        }

        if report.fired > 0 || report.store_failures > 0 {
            info!(kind = %kind, ?report, "Evaluation pass finished");
        } else {
            debug!(kind = %kind, ?report, "Evaluation pass finished");
        }
        report
    }

    /// # Summary
    /// 按候选用户依次尝试抓取，凭证错误时换下一个用户。
    ///
    /// # Logic
    /// 1. 按顺序调用价格源；`Credential` 错误继续尝试下一个用户。
    /// 2. 其他错误立即返回。
    /// 3. 快照不可用（价格缺失、NaN、非正）视为解析失败。
    async fn fetch_with_fallback(
        &self,
        ticker: &str,
        owners: &[String],
    ) -> Result<PriceSnapshot, MarketError> {
        let mut last_err = MarketError::Credential(format!("no credential owner for {}", ticker));
        for owner in owners {
            match self.source.fetch(ticker, owner).await {
                Ok(quote) if quote.is_usable() => return Ok(quote),
                Ok(quote) => {
                    return Err(MarketError::Parse(format!(
                        "unusable snapshot for {}: last={}",
                        ticker, quote.last
                    )));
                }
                Err(MarketError::Credential(msg)) => {
                    debug!(ticker, user_id = %owner, reason = %msg, "Credential rejected, trying next owner");
                    last_err = MarketError::Credential(msg);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err)
    }

    fn hand_off(&self, job: DispatchJob) {
        let tx = self.dispatch_tx.lock().unwrap_or_else(|e| e.into_inner());
        let Some(tx) = tx.as_ref() else {
            warn!(
                alert_id = %job.alert.id,
                trigger_id = %job.record.id,
                "Dispatcher shut down, notification dropped"
            );
            return;
        };
        if let Err(e) = tx.try_send(job) {
            let job = e.into_inner();
            warn!(
                alert_id = %job.alert.id,
                trigger_id = %job.record.id,
                "Dispatch queue unavailable, notification dropped"
            );
        }
    }
}

/// 标的下各预警的所属用户，去重并保持加载顺序
fn candidate_owners(alerts: &[Arc<Alert>]) -> Vec<String> {
    let mut owners: Vec<String> = Vec::new();
    for alert in alerts {
        if !owners.contains(&alert.user_id) {
            owners.push(alert.user_id.clone());
        }
    }
    owners
}
