//! Explainable model score.
//!
//! `score = clamp01(reliability*0.3 + expertise*0.4 + priorQuality*0.3
//!                   - statusPenalty - costPenalty)`
//!
//! Every term is reported in `ScoreBreakdown` so a caller can explain a
//! ranking decision without recomputing it. A disabled model always scores
//! zero; every other term is computed from the entry's own fields plus the
//! performance prior for the task/difficulty pair, when one exists.

use serde::Serialize;

use crate::domain::{ModelRegistryEntry, ModelStatus, TierProfile};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScoreBreakdown {
    pub reliability_component: f64,
    pub expertise_component: f64,
    pub prior_quality_component: f64,
    pub status_penalty: f64,
    pub cost_penalty: f64,
    pub total: f64,
}

fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

fn status_penalty(status: ModelStatus) -> f64 {
    match status {
        ModelStatus::Probation => 0.15,
        ModelStatus::Deprecated => 0.10,
        _ => 0.0,
    }
}

/// Computes the explainable score for `entry` against `task_type`/`difficulty`
/// at the given `tier` and estimated `predicted_cost_usd` (before the prior's
/// cost multiplier is applied).
pub fn compute_model_score(
    entry: &ModelRegistryEntry,
    task_type: &str,
    difficulty: &str,
    tier: TierProfile,
    predicted_cost_usd: f64,
) -> ScoreBreakdown {
    if entry.identity.status == ModelStatus::Disabled {
        return ScoreBreakdown {
            reliability_component: 0.0,
            expertise_component: 0.0,
            prior_quality_component: 0.0,
            status_penalty: 0.0,
            cost_penalty: 0.0,
            total: 0.0,
        };
    }

    let reliability_component = entry.reliability * 0.3;
    let expertise_component = entry.expertise_for(task_type) * 0.4;

    let prior = entry.prior_for(task_type, difficulty);
    let prior_quality_component = prior
        .map(|p| p.quality_prior * p.calibration_confidence * 0.3)
        .unwrap_or(0.0);
    let cost_multiplier = prior.map(|p| p.cost_multiplier).unwrap_or(1.0);

    let status_penalty = status_penalty(entry.identity.status);

    let threshold = tier.threshold_usd();
    let adjusted_cost = predicted_cost_usd * cost_multiplier;
    let cost_penalty = if adjusted_cost > threshold {
        (0.25f64).min((adjusted_cost / threshold - 1.0) * 0.1)
    } else {
        0.0
    };

    let total = clamp01(
        reliability_component + expertise_component + prior_quality_component
            - status_penalty
            - cost_penalty,
    );

    ScoreBreakdown {
        reliability_component,
        expertise_component,
        prior_quality_component,
        status_penalty,
        cost_penalty,
        total,
    }
}
