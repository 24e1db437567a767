//! Canary suite lifecycle and status transitions.
//!
//! A model enters `Running` when a canary suite is kicked off, then a
//! finished suite's failure count and average quality are folded into one of
//! three transitions: `canary_regression` (demote to probation), rewarded
//! `canary_graduate` (reactivate a probationary model), or `no_change`.

use crate::domain::{CanaryStatus, HrActionKind, HrSignal, ModelRegistryEntry, ModelStatus};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanaryOutcome {
    pub status: CanaryStatus,
    pub recommended_action: Option<HrActionKind>,
    pub reason: &'static str,
}

/// Folds a finished canary suite's results into a status transition:
///
/// | failedCount             | avgQuality          | outcome            |
/// |--------------------------|----------------------|--------------------|
/// | >= probation_fail_count  | any                  | canary_regression  |
/// | <  probation_fail_count  | <  probation_quality | canary_regression  |
/// | == 0                     | >= graduate_quality  | canary_graduate    |
/// | otherwise                |                      | no_change          |
pub fn evaluate_suite_for_status_change(
    current_model_status: ModelStatus,
    failed_count: u32,
    avg_quality: f64,
    probation_fail_count: u32,
    graduate_quality: f64,
    probation_quality: f64,
) -> CanaryOutcome {
    let demotes = || {
        (current_model_status == ModelStatus::Active || current_model_status == ModelStatus::Probation)
            .then_some(HrActionKind::Probation)
    };

    if failed_count >= probation_fail_count {
        return CanaryOutcome {
            status: CanaryStatus::Failed,
            recommended_action: demotes(),
            reason: "canary_regression",
        };
    }

    if avg_quality < probation_quality {
        return CanaryOutcome {
            status: CanaryStatus::Failed,
            recommended_action: demotes(),
            reason: "canary_regression",
        };
    }

    if failed_count == 0 && avg_quality >= graduate_quality {
        let action = matches!(current_model_status, ModelStatus::Probation)
            .then_some(HrActionKind::Activate);
        return CanaryOutcome {
            status: CanaryStatus::Passed,
            recommended_action: action,
            reason: "canary_graduate",
        };
    }

    CanaryOutcome {
        status: current_model_status_to_canary(current_model_status),
        recommended_action: None,
        reason: "no_change",
    }
}

/// Whether `model` should be queued for a fresh canary run given its recent
/// signals. Monotone in `recent_signals`: a probationary status or an
/// un-run/failed canary always needs one, and a `pricing_changed` signal can
/// only add to that set, never remove from it.
pub fn needs_canary(model: &ModelRegistryEntry, recent_signals: &[HrSignal]) -> bool {
    if model.identity.status == ModelStatus::Probation {
        return true;
    }
    if matches!(
        model.evaluation_meta.canary_status,
        CanaryStatus::None | CanaryStatus::Failed
    ) {
        return true;
    }
    recent_signals
        .iter()
        .any(|s| s.model_id == model.id && s.reason == "pricing_changed")
}

fn current_model_status_to_canary(status: ModelStatus) -> CanaryStatus {
    match status {
        ModelStatus::Probation => CanaryStatus::Running,
        _ => CanaryStatus::Passed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::*;
    use std::collections::HashMap;

    fn base_entry() -> ModelRegistryEntry {
        let now = now();
        ModelRegistryEntry {
            id: "openai/gpt-4o".to_string(),
            identity: ModelIdentity {
                provider: "openai".to_string(),
                model_id: "gpt-4o".to_string(),
                status: ModelStatus::Active,
                aliases: Vec::new(),
                disabled_reason: None,
                disabled_at: None,
            },
            pricing: ModelPricing {
                in_per_1k: 0.005,
                out_per_1k: 0.015,
                currency: Currency::Usd,
                min_charge_usd: None,
            },
            expertise: HashMap::new(),
            reliability: 0.9,
            capabilities: Vec::new(),
            guardrails: Guardrails::default(),
            governance: Governance::default(),
            performance_priors: Vec::new(),
            evaluation_meta: EvaluationMeta::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn probation_model_always_needs_canary() {
        let mut entry = base_entry();
        entry.identity.status = ModelStatus::Probation;
        assert!(needs_canary(&entry, &[]));
    }

    #[test]
    fn passed_active_model_without_signals_does_not_need_canary() {
        let mut entry = base_entry();
        entry.evaluation_meta.canary_status = CanaryStatus::Passed;
        assert!(!needs_canary(&entry, &[]));
    }

    #[test]
    fn pricing_changed_signal_can_only_add_to_the_needs_canary_set() {
        let mut entry = base_entry();
        entry.evaluation_meta.canary_status = CanaryStatus::Passed;
        assert!(!needs_canary(&entry, &[]));

        let signal = HrSignal {
            model_id: entry.id.clone(),
            previous_status: Some(ModelStatus::Active),
            new_status: Some(ModelStatus::Active),
            reason: "pricing_changed".to_string(),
            ts: now(),
            context: None,
        };
        assert!(needs_canary(&entry, std::slice::from_ref(&signal)));
    }

    #[test]
    fn zero_failures_and_high_quality_graduates_probation_model() {
        let outcome = evaluate_suite_for_status_change(ModelStatus::Probation, 0, 0.9, 2, 0.82, 0.70);
        assert_eq!(outcome.status, CanaryStatus::Passed);
        assert_eq!(outcome.recommended_action, Some(HrActionKind::Activate));
        assert_eq!(outcome.reason, "canary_graduate");
    }

    #[test]
    fn failures_at_or_above_ceiling_force_probation_regardless_of_quality() {
        let outcome = evaluate_suite_for_status_change(ModelStatus::Active, 2, 0.95, 2, 0.82, 0.70);
        assert_eq!(outcome.status, CanaryStatus::Failed);
        assert_eq!(outcome.recommended_action, Some(HrActionKind::Probation));
        assert_eq!(outcome.reason, "canary_regression");
    }

    #[test]
    fn low_avg_quality_recommends_probation_even_with_few_failures() {
        let outcome = evaluate_suite_for_status_change(ModelStatus::Active, 1, 0.5, 2, 0.82, 0.70);
        assert_eq!(outcome.status, CanaryStatus::Failed);
        assert_eq!(outcome.recommended_action, Some(HrActionKind::Probation));
        assert_eq!(outcome.reason, "canary_regression");
    }

    #[test]
    fn mid_band_keeps_running_without_action() {
        let outcome = evaluate_suite_for_status_change(ModelStatus::Probation, 1, 0.75, 2, 0.82, 0.70);
        assert_eq!(outcome.status, CanaryStatus::Running);
        assert_eq!(outcome.recommended_action, None);
        assert_eq!(outcome.reason, "no_change");
    }
}
