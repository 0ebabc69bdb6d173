use keiho_core::alert::entity::{Alert, AlertState};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// 按标的分组的预警快照，组内保持加载顺序
pub type TickerSnapshot = Arc<BTreeMap<String, Vec<Arc<Alert>>>>;

/// # Summary
/// 一次重载的结果统计。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadStats {
    // 新出现的预警数
    pub added: usize,
    // 被移除（停用或删除）的预警数
    pub removed: usize,
    // 重载后的预警总数
    pub total: usize,
}

/// # Summary
/// 预警状态的所有权容器：预警 ID -> 运行状态。
///
/// # Invariants
/// - `states` 的键集合与分组快照中的预警 ID 集合完全一致。
/// - 只收录 `active == true` 的预警；重复 ID 以第一次出现为准。
/// - 快照以 `Arc` 整体替换，已发出的快照不会被后续重载修改。
#[derive(Debug, Default)]
pub struct AlertBook {
    by_ticker: TickerSnapshot,
    states: HashMap<String, AlertState>,
}

impl AlertBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Summary
    /// 用新加载的预警整体替换当前内容。
    ///
    /// # Logic
    /// 1. 过滤停用预警，按标的分组并保持输入顺序。
    /// 2. 已知 ID 沿用原有状态，新 ID 初始化为默认（ARMED）状态。
    /// 3. 不再出现的 ID 连同其状态一起丢弃。
    ///
    /// # Arguments
    /// * `alerts` - 仓库返回的预警列表。
    ///
    /// # Returns
    /// 新增、移除与总数统计。
    pub fn replace(&mut self, alerts: Vec<Alert>) -> ReloadStats {
        let mut by_ticker: BTreeMap<String, Vec<Arc<Alert>>> = BTreeMap::new();
        let mut states = HashMap::with_capacity(alerts.len());
        let mut seen = HashSet::with_capacity(alerts.len());
        let mut added = 0;

        for alert in alerts.into_iter().filter(|a| a.active) {
            if !seen.insert(alert.id.clone()) {
                continue;
            }
            let state = match self.states.remove(&alert.id) {
                Some(existing) => existing,
                None => {
                    added += 1;
                    AlertState::default()
                }
            };
            states.insert(alert.id.clone(), state);
            by_ticker
                .entry(alert.ticker.clone())
                .or_default()
                .push(Arc::new(alert));
        }

        // 剩下的即本次被移除的
        let removed = self.states.len();
        let total = states.len();
        self.states = states;
        self.by_ticker = Arc::new(by_ticker);

        ReloadStats {
            added,
            removed,
            total,
        }
    }

    /// 当前分组快照
    pub fn snapshot_by_ticker(&self) -> TickerSnapshot {
        Arc::clone(&self.by_ticker)
    }

    pub fn state(&self, alert_id: &str) -> Option<&AlertState> {
        self.states.get(alert_id)
    }

    /// 预警已被移除时返回 `None`
    pub fn state_mut(&mut self, alert_id: &str) -> Option<&mut AlertState> {
        self.states.get_mut(alert_id)
    }

    pub fn contains(&self, alert_id: &str) -> bool {
        self.states.contains_key(alert_id)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keiho_core::alert::entity::Direction;
    use keiho_core::common::TimeFrame;
    use keiho_core::test_utils::sample_alert;

    fn alert(id: &str, ticker: &str) -> Alert {
        sample_alert(id, "u1", ticker, Direction::Above, 100.0, TimeFrame::Minute5)
    }

    #[test]
    fn test_replace_groups_by_ticker_in_load_order() {
        let mut book = AlertBook::new();
        let stats = book.replace(vec![alert("a", "MNQ"), alert("b", "ES"), alert("c", "MNQ")]);
        assert_eq!(stats, ReloadStats { added: 3, removed: 0, total: 3 });

        let snap = book.snapshot_by_ticker();
        let mnq: Vec<&str> = snap["MNQ"].iter().map(|a| a.id.as_str()).collect();
        assert_eq!(mnq, vec!["a", "c"]);
        assert_eq!(snap["ES"].len(), 1);
    }

    #[test]
    fn test_replace_keeps_known_state_and_drops_removed() {
        let mut book = AlertBook::new();
        book.replace(vec![alert("a", "MNQ"), alert("b", "MNQ")]);
        if let Some(state) = book.state_mut("a") {
            state.triggered_this_bucket = true;
            state.last_observed_price = Some(101.0);
        }

        let mut inactive = alert("b", "MNQ");
        inactive.active = false;
        let stats = book.replace(vec![alert("a", "MNQ"), inactive, alert("d", "ES")]);

        assert_eq!(stats, ReloadStats { added: 1, removed: 1, total: 2 });
        assert!(book.state("a").unwrap().triggered_this_bucket);
        assert!(!book.contains("b"));
        assert!(book.state("d").unwrap().is_armed());
    }

    #[test]
    fn test_old_snapshot_is_not_mutated_by_replace() {
        let mut book = AlertBook::new();
        book.replace(vec![alert("a", "MNQ")]);
        let before = book.snapshot_by_ticker();

        book.replace(vec![]);
        assert_eq!(before["MNQ"].len(), 1);
        assert!(book.snapshot_by_ticker().is_empty());
        assert!(book.is_empty());
        assert!(book.state_mut("a").is_none());
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let mut book = AlertBook::new();
        let stats = book.replace(vec![alert("a", "MNQ"), alert("a", "ES")]);
        assert_eq!(stats.total, 1);
        let snap = book.snapshot_by_ticker();
        assert!(snap.contains_key("MNQ"));
        assert!(!snap.contains_key("ES"));
    }
}
