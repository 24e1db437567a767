//! Append-only run ledger store.
//!
//! One `Ledger` per `runSessionId`, capped at a fixed number of decisions
//! (older decisions are dropped, newest kept) and evicted process-wide on an
//! LRU basis once the process holds more ledgers than its configured cap —
//! storage failures here must never fail a run, so every write degrades to
//! a logged no-op rather than propagating.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::domain::{
    CostKind, Decision, DecisionType, Ledger, RoleExecution, RunStatus, TrustDelta,
};

struct LedgerState {
    ledgers: HashMap<String, Ledger>,
    lru_order: Vec<String>,
}

pub struct LedgerStore {
    state: Mutex<LedgerState>,
    max_decisions_per_ledger: usize,
    max_ledgers: usize,
}

impl LedgerStore {
    pub fn new(max_decisions_per_ledger: usize, max_ledgers: usize) -> Self {
        Self {
            state: Mutex::new(LedgerState {
                ledgers: HashMap::new(),
                lru_order: Vec::new(),
            }),
            max_decisions_per_ledger,
            max_ledgers,
        }
    }

    fn touch(state: &mut LedgerState, run_session_id: &str) {
        state.lru_order.retain(|id| id != run_session_id);
        state.lru_order.push(run_session_id.to_string());
    }

    fn evict_if_needed(state: &mut LedgerState, max_ledgers: usize) {
        while state.ledgers.len() > max_ledgers {
            if let Some(oldest) = state.lru_order.first().cloned() {
                state.ledgers.remove(&oldest);
                state.lru_order.remove(0);
            } else {
                break;
            }
        }
    }

    pub async fn create_ledger(&self, run_session_id: String) -> Ledger {
        let mut state = self.state.lock().await;
        let ledger = Ledger::new(run_session_id.clone());
        state.ledgers.insert(run_session_id.clone(), ledger.clone());
        Self::touch(&mut state, &run_session_id);
        Self::evict_if_needed(&mut state, self.max_ledgers);
        ledger
    }

    pub async fn get_ledger(&self, run_session_id: &str) -> Option<Ledger> {
        let mut state = self.state.lock().await;
        let found = state.ledgers.get(run_session_id).cloned();
        if found.is_some() {
            Self::touch(&mut state, run_session_id);
        }
        found
    }

    pub async fn list_ledgers(&self) -> Vec<Ledger> {
        let state = self.state.lock().await;
        let mut ledgers: Vec<Ledger> = state.ledgers.values().cloned().collect();
        ledgers.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        ledgers
    }

    pub async fn record_decision(
        &self,
        run_session_id: &str,
        kind: DecisionType,
        package_id: Option<String>,
        details: serde_json::Value,
    ) {
        let mut state = self.state.lock().await;
        let Some(ledger) = state.ledgers.get_mut(run_session_id) else {
            tracing::warn!(run_session_id, "record_decision on unknown ledger (swallowed)");
            return;
        };
        if ledger.is_finalized() {
            tracing::warn!(run_session_id, "record_decision on finalized ledger (swallowed)");
            return;
        }
        ledger.decisions.push(Decision {
            kind,
            package_id,
            details,
            ts: crate::domain::now(),
        });
        if ledger.decisions.len() > self.max_decisions_per_ledger {
            let drop_n = ledger.decisions.len() - self.max_decisions_per_ledger;
            ledger.decisions.drain(0..drop_n);
        }
        Self::touch(&mut state, run_session_id);
    }

    pub async fn record_cost(&self, run_session_id: &str, kind: CostKind, amount_usd: f64) {
        let mut state = self.state.lock().await;
        let Some(ledger) = state.ledgers.get_mut(run_session_id) else {
            tracing::warn!(run_session_id, "record_cost on unknown ledger (swallowed)");
            return;
        };
        if ledger.is_finalized() {
            tracing::warn!(run_session_id, "record_cost on finalized ledger (swallowed)");
            return;
        }
        ledger.costs.add(kind, amount_usd);
        Self::touch(&mut state, run_session_id);
    }

    pub async fn record_trust_delta(&self, run_session_id: &str, delta: TrustDelta) {
        let mut state = self.state.lock().await;
        let Some(ledger) = state.ledgers.get_mut(run_session_id) else {
            tracing::warn!(run_session_id, "record_trust_delta on unknown ledger (swallowed)");
            return;
        };
        if ledger.is_finalized() {
            tracing::warn!(run_session_id, "record_trust_delta on finalized ledger (swallowed)");
            return;
        }
        ledger.trust_deltas.push(delta);
        Self::touch(&mut state, run_session_id);
    }

    pub async fn record_role_execution(&self, run_session_id: &str, execution: RoleExecution) {
        let mut state = self.state.lock().await;
        let Some(ledger) = state.ledgers.get_mut(run_session_id) else {
            return;
        };
        ledger.role_executions.push(execution);
        Self::touch(&mut state, run_session_id);
    }

    pub async fn record_variance_recorded(&self, run_session_id: &str) {
        let mut state = self.state.lock().await;
        if let Some(ledger) = state.ledgers.get_mut(run_session_id) {
            ledger.variance.recorded += 1;
        }
    }

    pub async fn record_variance_skipped(&self, run_session_id: &str, reason: &str) {
        let mut state = self.state.lock().await;
        if let Some(ledger) = state.ledgers.get_mut(run_session_id) {
            ledger.variance.skipped += 1;
            ledger.variance.skip_reasons.push(reason.to_string());
        }
    }

    pub async fn update_counts<F>(&self, run_session_id: &str, f: F)
    where
        F: FnOnce(&mut crate::domain::Counts),
    {
        let mut state = self.state.lock().await;
        if let Some(ledger) = state.ledgers.get_mut(run_session_id) {
            f(&mut ledger.counts);
        }
    }

    pub async fn add_warning(&self, run_session_id: &str, warning: String) {
        let mut state = self.state.lock().await;
        if let Some(ledger) = state.ledgers.get_mut(run_session_id) {
            ledger.warnings.push(warning);
        }
    }

    pub async fn finalize_ledger(&self, run_session_id: &str, status: RunStatus) -> Option<Ledger> {
        let mut state = self.state.lock().await;
        let ledger = state.ledgers.get_mut(run_session_id)?;
        ledger.finished_at = Some(crate::domain::now());
        ledger.status = Some(status);
        Self::touch(&mut state, run_session_id);
        Some(ledger.clone())
    }
}

pub type SharedLedgerStore = Arc<LedgerStore>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = LedgerStore::new(200, 200);
        store.create_ledger("run-1".to_string()).await;
        let ledger = store.get_ledger("run-1").await.unwrap();
        assert_eq!(ledger.run_session_id, "run-1");
        assert_eq!(ledger.status, Some(RunStatus::Running));
    }

    #[tokio::test]
    async fn decisions_cap_drops_oldest() {
        let store = LedgerStore::new(2, 200);
        store.create_ledger("run-1".to_string()).await;
        for i in 0..5 {
            store
                .record_decision(
                    "run-1",
                    DecisionType::Route,
                    None,
                    serde_json::json!({"i": i}),
                )
                .await;
        }
        let ledger = store.get_ledger("run-1").await.unwrap();
        assert_eq!(ledger.decisions.len(), 2);
        assert_eq!(ledger.decisions[1].details["i"], 4);
    }

    #[tokio::test]
    async fn ledger_count_eviction_drops_lru() {
        let store = LedgerStore::new(200, 2);
        store.create_ledger("run-1".to_string()).await;
        store.create_ledger("run-2".to_string()).await;
        store.create_ledger("run-3".to_string()).await;
        assert!(store.get_ledger("run-1").await.is_none());
        assert!(store.get_ledger("run-2").await.is_some());
        assert!(store.get_ledger("run-3").await.is_some());
    }

    #[tokio::test]
    async fn finalize_sets_status_and_timestamp() {
        let store = LedgerStore::new(200, 200);
        store.create_ledger("run-1".to_string()).await;
        let finalized = store.finalize_ledger("run-1", RunStatus::Completed).await.unwrap();
        assert!(finalized.is_finalized());
        assert_eq!(finalized.status, Some(RunStatus::Completed));
    }

    #[tokio::test]
    async fn record_on_unknown_ledger_is_swallowed() {
        let store = LedgerStore::new(200, 200);
        store
            .record_decision("ghost", DecisionType::Route, None, serde_json::json!({}))
            .await;
    }

    #[tokio::test]
    async fn mutation_after_finalize_is_a_no_op() {
        let store = LedgerStore::new(200, 200);
        store.create_ledger("run-1".to_string()).await;
        store.finalize_ledger("run-1", RunStatus::Completed).await.unwrap();

        store
            .record_decision("run-1", DecisionType::Route, None, serde_json::json!({"i": 1}))
            .await;
        store.record_cost("run-1", CostKind::Worker, 1.0).await;
        store
            .record_trust_delta(
                "run-1",
                TrustDelta {
                    model_id: "openai/gpt-4o".to_string(),
                    role: "worker".to_string(),
                    delta: 0.1,
                    ts: crate::domain::now(),
                },
            )
            .await;

        let ledger = store.get_ledger("run-1").await.unwrap();
        assert!(ledger.decisions.is_empty());
        assert_eq!(ledger.costs.total_usd(), 0.0);
        assert!(ledger.trust_deltas.is_empty());
    }
}
