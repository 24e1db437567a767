//! Deterministic tuning-proposal generation and the apply policy gating
//! which proposals may be auto-applied.

use crate::analytics::kpi::KpiAggregate;
use crate::domain::{PortfolioMode, TuningAction, TuningConfig, TuningProposal};
use crate::error::{AppError, AppResult};
use crate::utils::stable_proposal_id;

/// Bypass rate at/above which a `lock`'d portfolio is proposed to relax to `prefer`.
const HIGH_BYPASS_RATE_THRESHOLD: f64 = 0.30;
/// Share of bypasses a reason must hold to be treated as dominant.
const DOMINANT_REASON_SHARE: f64 = 0.50;
/// Share of down-trust deltas at/above which a portfolio refresh is proposed.
const HIGH_QA_TRUST_LOW_SHARE: f64 = 0.20;
/// Minimum completion rate required before lowering the quality floor is proposed.
const HEALTHY_COMPLETION_RATE: f64 = 0.70;
const MIN_PREDICTED_QUALITY_STEP: f64 = 0.02;
const MIN_PREDICTED_QUALITY_FLOOR: f64 = 0.5;

/// Generates proposals from the three deterministic rules:
/// 1. Locked portfolio bypasses often, dominantly on budget -> relax to `prefer`.
/// 2. A large share of QA trust deltas are negative -> force a portfolio refresh.
/// 3. Bypasses are dominantly on quality with otherwise healthy completion ->
///    lower the minimum predicted quality floor so more models qualify.
pub fn generate_proposals(kpi: &KpiAggregate, current_mode: PortfolioMode) -> Vec<TuningProposal> {
    let mut proposals = Vec::new();

    let dominant_reason = kpi
        .dominant_bypass_reason
        .as_ref()
        .filter(|(_, share)| *share >= DOMINANT_REASON_SHARE)
        .map(|(reason, _)| reason.as_str());

    if current_mode == PortfolioMode::Lock
        && kpi.average_bypass_rate >= HIGH_BYPASS_RATE_THRESHOLD
        && dominant_reason == Some("allowed_models_over_budget")
    {
        let details = serde_json::json!({"mode": "prefer"});
        proposals.push(TuningProposal {
            id: stable_proposal_id("set_portfolio_mode", &details),
            action: TuningAction::SetPortfolioMode,
            details,
            rationale: format!(
                "locked portfolio bypassed on budget in {:.0}% of routes",
                kpi.average_bypass_rate * 100.0
            ),
            safe_to_auto_apply: true,
        });
    }

    if kpi.average_qa_trust_low_share >= HIGH_QA_TRUST_LOW_SHARE {
        let details = serde_json::json!({"force_refresh": true});
        proposals.push(TuningProposal {
            id: stable_proposal_id("refresh_portfolio", &details),
            action: TuningAction::RefreshPortfolio,
            details,
            rationale: format!(
                "{:.0}% of recorded trust deltas lowered a model's trust",
                kpi.average_qa_trust_low_share * 100.0
            ),
            safe_to_auto_apply: true,
        });
    }

    if dominant_reason == Some("allowed_models_below_quality")
        && kpi.average_completion_rate >= HEALTHY_COMPLETION_RATE
    {
        let details = serde_json::json!({
            "delta": -MIN_PREDICTED_QUALITY_STEP,
            "floor": MIN_PREDICTED_QUALITY_FLOOR,
        });
        proposals.push(TuningProposal {
            id: stable_proposal_id("lower_min_predicted_quality", &details),
            action: TuningAction::LowerMinPredictedQuality,
            details,
            rationale: "bypasses are dominantly quality-driven despite healthy completion".to_string(),
            safe_to_auto_apply: false,
        });
    }

    proposals
}

/// Gates whether a proposal may be auto-applied: tuning must be enabled,
/// auto-apply must be allowed process-wide, and the proposal itself must be
/// marked safe.
pub fn can_auto_apply(config: &TuningConfig, proposal: &TuningProposal) -> AppResult<()> {
    if !config.enabled {
        return Err(AppError::TuningDisabled);
    }
    if !config.allow_auto_apply || !proposal.safe_to_auto_apply {
        return Err(AppError::not_safe(format!(
            "proposal {} is not safe to auto-apply",
            proposal.id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kpi_with(average_bypass_rate: f64, dominant: Option<(&str, f64)>, qa_trust_low_share: f64, completion: f64) -> KpiAggregate {
        KpiAggregate {
            run_count: 5,
            total_cost_usd: 10.0,
            average_completion_rate: completion,
            average_cost_per_run_usd: 2.0,
            average_bypass_rate,
            dominant_bypass_reason: dominant.map(|(r, s)| (r.to_string(), s)),
            average_qa_trust_low_share: qa_trust_low_share,
        }
    }

    #[test]
    fn high_bypass_on_budget_under_lock_proposes_prefer_mode() {
        let kpi = kpi_with(0.4, Some(("allowed_models_over_budget", 0.8)), 0.0, 0.9);
        let proposals = generate_proposals(&kpi, PortfolioMode::Lock);
        let proposal = proposals.iter().find(|p| p.action == TuningAction::SetPortfolioMode).unwrap();
        assert!(proposal.safe_to_auto_apply);
    }

    #[test]
    fn high_bypass_without_lock_mode_does_not_propose_prefer_mode() {
        let kpi = kpi_with(0.4, Some(("allowed_models_over_budget", 0.8)), 0.0, 0.9);
        let proposals = generate_proposals(&kpi, PortfolioMode::Prefer);
        assert!(!proposals.iter().any(|p| p.action == TuningAction::SetPortfolioMode));
    }

    #[test]
    fn high_qa_trust_low_share_proposes_refresh() {
        let kpi = kpi_with(0.0, None, 0.25, 0.9);
        let proposals = generate_proposals(&kpi, PortfolioMode::Prefer);
        let proposal = proposals.iter().find(|p| p.action == TuningAction::RefreshPortfolio).unwrap();
        assert!(proposal.safe_to_auto_apply);
    }

    #[test]
    fn dominant_quality_bypass_with_healthy_completion_proposes_lower_quality_floor() {
        let kpi = kpi_with(0.4, Some(("allowed_models_below_quality", 0.9)), 0.0, 0.8);
        let proposals = generate_proposals(&kpi, PortfolioMode::Lock);
        let proposal = proposals.iter().find(|p| p.action == TuningAction::LowerMinPredictedQuality).unwrap();
        assert!(!proposal.safe_to_auto_apply);
    }

    #[test]
    fn healthy_kpi_proposes_nothing() {
        let kpi = kpi_with(0.0, None, 0.0, 0.95);
        let proposals = generate_proposals(&kpi, PortfolioMode::Prefer);
        assert!(proposals.is_empty());
    }

    #[test]
    fn proposal_ids_are_stable_across_calls() {
        let kpi = kpi_with(0.4, Some(("allowed_models_over_budget", 0.8)), 0.0, 0.9);
        let a = generate_proposals(&kpi, PortfolioMode::Lock);
        let b = generate_proposals(&kpi, PortfolioMode::Lock);
        assert_eq!(a[0].id, b[0].id);
    }

    #[test]
    fn disabled_tuning_blocks_auto_apply() {
        let config = TuningConfig { enabled: false, allow_auto_apply: true };
        let proposal = TuningProposal {
            id: "x".to_string(),
            action: TuningAction::RefreshPortfolio,
            details: serde_json::json!({}),
            rationale: "test".to_string(),
            safe_to_auto_apply: true,
        };
        assert!(can_auto_apply(&config, &proposal).is_err());
    }

    #[test]
    fn unsafe_proposal_is_rejected_even_when_allowed() {
        let config = TuningConfig { enabled: true, allow_auto_apply: true };
        let proposal = TuningProposal {
            id: "x".to_string(),
            action: TuningAction::SetPortfolioMode,
            details: serde_json::json!({}),
            rationale: "test".to_string(),
            safe_to_auto_apply: false,
        };
        assert!(can_auto_apply(&config, &proposal).is_err());
    }
}
