//! Ledger summarisation and cross-ledger KPI aggregation.

use std::collections::HashMap;

use serde::Serialize;

use crate::domain::{DecisionType, Ledger};

/// Top N bypass reasons kept in a summary.
const TOP_BYPASS_REASONS: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct LedgerSummary {
    pub run_session_id: String,
    pub total_cost_usd: f64,
    pub completed_packages: u64,
    pub failed_packages: u64,
    pub skipped_packages: u64,
    pub completion_rate: f64,
    pub variance_recorded_rate: f64,
    /// Share of `ROUTE` decisions that bypassed a locked/preferred portfolio slot.
    pub bypass_rate: f64,
    /// Bypass reasons by frequency, most common first, capped at 5.
    pub top_bypass_reasons: Vec<(String, u64)>,
    pub escalations_count: u64,
    /// Share of recorded trust deltas that moved a model's trust down.
    pub qa_trust_low_share: f64,
    pub avg_qa_quality_score: Option<f64>,
}

pub fn summarize_ledger(ledger: &Ledger) -> LedgerSummary {
    let total = ledger.counts.total_packages.max(1);
    let variance_total = (ledger.variance.recorded + ledger.variance.skipped).max(1);

    let route_decisions: Vec<&crate::domain::Decision> = ledger
        .decisions
        .iter()
        .filter(|d| d.kind == DecisionType::Route)
        .collect();
    let bypassed = route_decisions
        .iter()
        .filter(|d| d.details.get("portfolio_bypassed").and_then(|v| v.as_bool()) == Some(true))
        .count();
    let bypass_rate = bypassed as f64 / route_decisions.len().max(1) as f64;

    let mut reason_counts: HashMap<String, u64> = HashMap::new();
    for d in &route_decisions {
        if let Some(reason) = d.details.get("bypass_reason").and_then(|v| v.as_str()) {
            *reason_counts.entry(reason.to_string()).or_insert(0) += 1;
        }
    }
    let mut top_bypass_reasons: Vec<(String, u64)> = reason_counts.into_iter().collect();
    top_bypass_reasons.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top_bypass_reasons.truncate(TOP_BYPASS_REASONS);

    let escalations_count = ledger
        .decisions
        .iter()
        .filter(|d| d.kind == DecisionType::Escalation)
        .count() as u64;

    let qa_trust_low_share = if ledger.trust_deltas.is_empty() {
        0.0
    } else {
        ledger.trust_deltas.iter().filter(|t| t.delta < 0.0).count() as f64
            / ledger.trust_deltas.len() as f64
    };

    let quality_scores: Vec<f64> = ledger
        .decisions
        .iter()
        .filter(|d| d.kind == DecisionType::Escalation)
        .filter_map(|d| d.details.get("quality_score").and_then(|v| v.as_f64()))
        .collect();
    let avg_qa_quality_score = if quality_scores.is_empty() {
        None
    } else {
        Some(quality_scores.iter().sum::<f64>() / quality_scores.len() as f64)
    };

    LedgerSummary {
        run_session_id: ledger.run_session_id.clone(),
        total_cost_usd: ledger.costs.total_usd(),
        completed_packages: ledger.counts.completed_packages,
        failed_packages: ledger.counts.failed_packages,
        skipped_packages: ledger.counts.skipped_packages,
        completion_rate: ledger.counts.completed_packages as f64 / total as f64,
        variance_recorded_rate: ledger.variance.recorded as f64 / variance_total as f64,
        bypass_rate,
        top_bypass_reasons,
        escalations_count,
        qa_trust_low_share,
        avg_qa_quality_score,
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct KpiAggregate {
    pub run_count: usize,
    pub total_cost_usd: f64,
    pub average_completion_rate: f64,
    pub average_cost_per_run_usd: f64,
    pub average_bypass_rate: f64,
    /// The most frequent bypass reason across all runs and its share of
    /// every bypass observed (empty when no run ever bypassed).
    pub dominant_bypass_reason: Option<(String, f64)>,
    pub average_qa_trust_low_share: f64,
}

pub fn aggregate_kpis(ledgers: &[Ledger]) -> KpiAggregate {
    if ledgers.is_empty() {
        return KpiAggregate::default();
    }
    let summaries: Vec<LedgerSummary> = ledgers.iter().map(summarize_ledger).collect();
    let total_cost_usd: f64 = summaries.iter().map(|s| s.total_cost_usd).sum();
    let average_completion_rate =
        summaries.iter().map(|s| s.completion_rate).sum::<f64>() / summaries.len() as f64;
    let average_bypass_rate = summaries.iter().map(|s| s.bypass_rate).sum::<f64>() / summaries.len() as f64;
    let average_qa_trust_low_share =
        summaries.iter().map(|s| s.qa_trust_low_share).sum::<f64>() / summaries.len() as f64;

    let mut reason_totals: HashMap<String, u64> = HashMap::new();
    for summary in &summaries {
        for (reason, count) in &summary.top_bypass_reasons {
            *reason_totals.entry(reason.clone()).or_insert(0) += count;
        }
    }
    let total_bypasses: u64 = reason_totals.values().sum();
    let dominant_bypass_reason = reason_totals
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(reason, count)| (reason, count as f64 / total_bypasses.max(1) as f64));

    KpiAggregate {
        run_count: ledgers.len(),
        total_cost_usd,
        average_completion_rate,
        average_cost_per_run_usd: total_cost_usd / ledgers.len() as f64,
        average_bypass_rate,
        dominant_bypass_reason,
        average_qa_trust_low_share,
    }
}
