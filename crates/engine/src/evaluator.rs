use crate::clock::CandleClock;
use chrono::{DateTime, Utc};
use keiho_core::alert::entity::{Alert, AlertState};
use keiho_core::market::entity::PriceSnapshot;
use keiho_core::trigger::entity::{AppendOutcome, TriggerDraft, TriggerRecord};
use keiho_core::trigger::port::TriggerLog;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// # Summary
/// 纯状态转移阶段的结论。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    // 快照不可用，状态未动
    Skip,
    // 未穿越，或本桶已触发
    Hold,
    // ARMED 且穿越，需经触发日志确认
    Candidate,
}

/// # Summary
/// 单个预警一次评估的最终结果。
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    // 快照不可用，未做任何改动
    Skipped,
    // 维持原状态（可能已更新最新观察价）
    Held,
    // 新触发，记录已落库，需要派发通知
    Fired(TriggerRecord),
    // 触发日志中已有窗口内记录，标记为 FIRED 但不派发
    Deduplicated,
    // 触发日志不可用，保持 ARMED 且不派发
    StoreFailed,
}

/// # Summary
/// 预警状态机。
///
/// # Invariants
/// - 只用最新成交价做穿越判定，不看最高/最低价。
/// - 只有 `TriggerLog::append` 返回 `Inserted` 才会产生 `Fired`，
///   因此每个 (预警, 窗口) 至多派发一次通知。
/// - 触发日志出错时宁可漏报也不重复：保持 ARMED、不派发，下次轮询会重新尝试。
pub struct AlertEvaluator {
    clock: CandleClock,
    triggers: Arc<dyn TriggerLog>,
}

impl AlertEvaluator {
    pub fn new(clock: CandleClock, triggers: Arc<dyn TriggerLog>) -> Self {
        Self { clock, triggers }
    }

    pub fn clock(&self) -> &CandleClock {
        &self.clock
    }

    /// # Summary
    /// 状态转移的纯函数部分，不访问任何外部资源。
    ///
    /// # Logic
    /// 1. 快照不可用（最新价缺失、NaN、非正）直接 `Skip`，状态不变。
    /// 2. 当前桶起点与 `last_bucket_start` 不同：无条件回到 ARMED 并记录新桶。
    /// 3. 记录最新观察价。
    /// 4. ARMED 且穿越 -> `Candidate`，否则 `Hold`。
    ///
    /// # Arguments
    /// * `alert` - 预警定义。
    /// * `state` - 该预警的运行状态。
    /// * `snapshot` - 本轮价格快照。
    /// * `now` - 评估时刻。
    pub fn decide(
        &self,
        alert: &Alert,
        state: &mut AlertState,
        snapshot: &PriceSnapshot,
        now: DateTime<Utc>,
    ) -> Decision {
        if !snapshot.is_usable() {
            return Decision::Skip;
        }

        let bucket = self.clock.bucket_start(alert.timeframe, now);
        if state.last_bucket_start != Some(bucket) {
            state.triggered_this_bucket = false;
            state.last_bucket_start = Some(bucket);
        }

        state.last_observed_price = Some(snapshot.last);

        if state.is_armed() && alert.direction.is_crossed(snapshot.last, alert.threshold) {
            Decision::Candidate
        } else {
            Decision::Hold
        }
    }

    /// # Summary
    /// 评估一个预警，必要时通过触发日志确认并落库。
    ///
    /// # Logic
    /// 1. 调用 `decide` 完成状态转移。
    /// 2. 候选触发时查询最小间隔内的历史记录，存在则视为已触发（覆盖重启与重叠轮询）。
    /// 3. 否则条件追加触发记录；`Duplicate` 同样视为已触发。
    /// 4. 日志读写失败时记录错误，保持 ARMED，不派发。
    ///
    /// # Returns
    /// 评估结果，`Fired` 携带已落库的触发记录。
    pub async fn evaluate(
        &self,
        alert: &Alert,
        state: &mut AlertState,
        snapshot: &PriceSnapshot,
        now: DateTime<Utc>,
    ) -> Evaluation {
        match self.decide(alert, state, snapshot, now) {
            Decision::Skip => return Evaluation::Skipped,
            Decision::Hold => return Evaluation::Held,
            Decision::Candidate => {}
        }

        let window = alert.timeframe.min_interval();

        match self.triggers.recent_trigger(&alert.id, window, now).await {
            Ok(Some(existing)) => {
                debug!(
                    alert_id = %alert.id,
                    trigger_id = %existing.id,
                    "Recent trigger found, marking fired without dispatch"
                );
                state.triggered_this_bucket = true;
                return Evaluation::Deduplicated;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(alert_id = %alert.id, error = %e, "Dedupe check failed, alert stays armed");
                return Evaluation::StoreFailed;
            }
        }

        let draft = TriggerDraft {
            alert_id: alert.id.clone(),
            ticker: alert.ticker.clone(),
            price: snapshot.last,
            direction: alert.direction,
            triggered_at: now,
        };

        match self.triggers.append(&draft, window).await {
            Ok(AppendOutcome::Inserted(record)) => {
                info!(
                    alert_id = %alert.id,
                    ticker = %alert.ticker,
                    direction = %alert.direction,
                    threshold = alert.threshold,
                    price = snapshot.last,
                    timeframe = %alert.timeframe,
                    "Alert fired"
                );
                state.triggered_this_bucket = true;
                Evaluation::Fired(record)
            }
            Ok(AppendOutcome::Duplicate) => {
                debug!(alert_id = %alert.id, "Conditional append lost to an existing trigger");
                state.triggered_this_bucket = true;
                Evaluation::Deduplicated
            }
            Err(e) => {
                warn!(alert_id = %alert.id, error = %e, "Trigger append failed, alert stays armed");
                Evaluation::StoreFailed
            }
        }
    }
}
