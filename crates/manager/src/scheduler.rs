use keiho_core::config::EngineConfig;
use keiho_engine::book::ReloadStats;
use keiho_engine::engine::{AlertEngine, PassKind};
use keiho_engine::error::EngineError;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

// 运行中的两个轮询协程及其停止信号
struct Running {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

/// # Summary
/// 预警调度器：以快速轮询与对账轮询两个独立定时器驱动同一个 `AlertEngine`。
///
/// # Invariants
/// - 两个定时器共享引擎内部的评估闸门，重叠的轮询由引擎丢弃。
/// - `start` 与 `stop` 均为幂等操作。
/// - 停止时不会中断正在执行的评估轮次，只阻止后续轮询。
pub struct AlertManager {
    engine: Arc<AlertEngine>,
    fast: Duration,
    reconcile: Duration,
    running: Mutex<Option<Running>>,
}

impl AlertManager {
    /// # Summary
    /// 创建调度器，不会立即启动定时器。
    ///
    /// # Arguments
    /// * `engine` - 预警引擎。
    /// * `fast` - 快速轮询周期。
    /// * `reconcile` - 对账轮询周期。
    ///
    /// # Returns
    /// * `Arc<Self>` - 可共享的调度器实例。
    pub fn new(engine: Arc<AlertEngine>, fast: Duration, reconcile: Duration) -> Arc<Self> {
        Arc::new(Self {
            engine,
            fast: fast.max(Duration::from_millis(1)),
            reconcile: reconcile.max(Duration::from_millis(1)),
            running: Mutex::new(None),
        })
    }

    /// # Summary
    /// 按引擎配置中的两个周期创建调度器。
    ///
    /// # Returns
    /// 任一周期为 0 时返回 `EngineError::Config`。
    pub fn from_config(
        engine: Arc<AlertEngine>,
        config: &EngineConfig,
    ) -> Result<Arc<Self>, EngineError> {
        if config.fast_interval_secs == 0 {
            return Err(EngineError::Config(
                "engine.fast_interval_secs must be at least 1".into(),
            ));
        }
        if config.reconcile_interval_secs == 0 {
            return Err(EngineError::Config(
                "engine.reconcile_interval_secs must be at least 1".into(),
            ));
        }
        Ok(Self::new(
            engine,
            Duration::from_secs(config.fast_interval_secs),
            Duration::from_secs(config.reconcile_interval_secs),
        ))
    }

    /// # Summary
    /// 启动两个轮询协程。
    ///
    /// # Logic
    /// 1. 已在运行则直接返回 `false`。
    /// 2. 对账轮询立即执行第一次（同时完成首次加载），快速轮询在一个周期后开始。
    /// 3. 两个定时器均使用 `MissedTickBehavior::Skip`，落后的轮询不会补发。
    ///
    /// # Returns
    /// 本次调用实际启动了调度返回 `true`。
    pub fn start(&self) -> bool {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if running.is_some() {
            debug!("Alert manager already running");
            return false;
        }

        let (tx, rx) = watch::channel(false);
        let now = Instant::now();
        let handles = vec![
            tokio::spawn(tick_loop(
                self.engine.clone(),
                PassKind::Reconcile,
                now,
                self.reconcile,
                rx.clone(),
            )),
            tokio::spawn(tick_loop(
                self.engine.clone(),
                PassKind::Fast,
                now + self.fast,
                self.fast,
                rx,
            )),
        ];
        *running = Some(Running {
            shutdown: tx,
            handles,
        });

        info!(
            fast = ?self.fast,
            reconcile = ?self.reconcile,
            "Alert manager started"
        );
        true
    }

    /// # Summary
    /// 停止调度并等待两个轮询协程退出。
    ///
    /// # Logic
    /// 1. 取出运行句柄，未运行则直接返回。
    /// 2. 通过 watch 通道广播停止信号。
    /// 3. 等待协程结束；正在执行的评估轮次会先完成。
    pub async fn stop(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(running) = running else {
            debug!("Alert manager not running, stop ignored");
            return;
        };

        if running.shutdown.send(true).is_err() {
            debug!("Tick loops already gone");
        }
        for handle in running.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Tick loop ended abnormally");
            }
        }
        info!("Alert manager stopped");
    }

    /// # Summary
    /// 立即重载预警定义，供外部在增删改预警后调用。
    ///
    /// # Returns
    /// * `Result<ReloadStats, EngineError>` - 重载失败时引擎保留上一次成功的索引。
    pub async fn refresh(&self) -> Result<ReloadStats, EngineError> {
        let stats = self.engine.refresh().await?;
        info!(
            added = stats.added,
            removed = stats.removed,
            total = stats.total,
            "Alerts refreshed"
        );
        Ok(stats)
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

/// 单个定时器的轮询循环，评估在 `select!` 之外执行，停止信号不会打断它
async fn tick_loop(
    engine: Arc<AlertEngine>,
    kind: PassKind,
    first: Instant,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval_at(first, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }

        let report = match kind {
            PassKind::Fast => engine.run_pass(PassKind::Fast).await,
            PassKind::Reconcile => engine.reconcile().await,
        };
        if report.is_none() {
            debug!(kind = %kind, "Tick skipped, previous pass still running");
        }
    }
    debug!(kind = %kind, "Tick loop exited");
}
