//! `EvaluationService.recordObservation`.
//!
//! Folds a single `ModelObservation` into the matching
//! `ModelPerformancePrior` via an EWMA, tightens the variance band, and
//! raises an `HrSignal` (plus a recommended probation `HrAction`) when
//! quality regresses past the model's canary threshold three observations
//! in a row.

use std::sync::Arc;

use crate::domain::{
    HrAction, HrActionKind, HrSignal, ModelObservation, ModelStatus, RecommendedBy,
};
use crate::registry::storage::Storage;
use crate::utils::sha256_hex;

/// EWMA smoothing factor — weights the newest observation at 20%, matching
/// the calibration-confidence ramp described alongside it (no
/// no canonical default exists elsewhere, so a conservative midpoint is used).
const EWMA_ALPHA: f64 = 0.2;

/// Observations before calibration confidence saturates.
const CALIBRATION_SATURATION_SAMPLES: f64 = 50.0;

/// Consecutive below-threshold observations before auto-probation fires.
const PROBATION_STREAK: u32 = 3;

pub struct EvaluationService {
    storage: Arc<dyn Storage>,
    observation_cap: usize,
}

impl EvaluationService {
    pub fn new(storage: Arc<dyn Storage>, observation_cap: usize) -> Self {
        Self {
            storage,
            observation_cap,
        }
    }

    /// Updates the model's prior for `obs.task_type`/`obs.difficulty`, persists
    /// the observation, and enqueues a probation action if quality has
    /// regressed for `PROBATION_STREAK` consecutive observations.
    pub async fn record_observation(&self, mut obs: ModelObservation) -> anyhow::Result<()> {
        let Some(mut entry) = self.storage.get_model(&obs.model_id).await else {
            anyhow::bail!("unknown model: {}", obs.model_id);
        };

        if obs.deterministic_no_signal {
            self.storage.append_observation(obs, self.observation_cap).await;
            return Ok(());
        }

        let probation_quality = entry
            .governance
            .canary_thresholds
            .as_ref()
            .map(|t| t.probation_quality)
            .unwrap_or(0.70);

        {
            let prior = entry.prior_for_mut(&obs.task_type, &obs.difficulty);
            prior.quality_prior =
                prior.quality_prior * (1.0 - EWMA_ALPHA) + obs.actual_quality * EWMA_ALPHA;

            if obs.predicted_cost_usd > 0.0 {
                let observed_ratio = obs.actual_cost_usd / obs.predicted_cost_usd;
                prior.cost_multiplier =
                    (prior.cost_multiplier * (1.0 - EWMA_ALPHA) + observed_ratio * EWMA_ALPHA)
                        .clamp(0.1, 20.0);
            }

            prior.sample_count += 1;
            prior.calibration_confidence =
                (prior.sample_count as f64 / CALIBRATION_SATURATION_SAMPLES).min(1.0);
            prior.last_updated = crate::domain::now();

            let delta = (obs.actual_quality - prior.quality_prior).abs();
            let band = delta.max(0.02);
            prior.variance_band_low = Some((prior.quality_prior - band).max(0.0));
            prior.variance_band_high = Some((prior.quality_prior + band).min(1.0));

            if let Some(defects) = obs.defect_count {
                let rate = if defects > 0 { 1.0 } else { 0.0 };
                prior.defect_rate = Some(
                    prior.defect_rate.unwrap_or(0.0) * (1.0 - EWMA_ALPHA) + rate * EWMA_ALPHA,
                );
            }
        }

        let below_threshold = obs.actual_quality < probation_quality;
        entry = self.storage.upsert_model(entry).await;

        if below_threshold {
            let recent = self.storage.list_observations(&obs.model_id).await;
            let streak = recent
                .iter()
                .rev()
                .take_while(|o| o.actual_quality < probation_quality)
                .count();

            if streak + 1 >= PROBATION_STREAK as usize
                && entry.identity.status == ModelStatus::Active
                && !entry.governance.disable_auto_disable
            {
                self.storage
                    .append_signal(HrSignal {
                        model_id: entry.id.clone(),
                        previous_status: Some(entry.identity.status),
                        new_status: Some(ModelStatus::Probation),
                        reason: "quality_regression".to_string(),
                        ts: crate::domain::now(),
                        context: Some(serde_json::json!({
                            "task_type": obs.task_type,
                            "streak": streak + 1,
                        })),
                    })
                    .await;

                let details = serde_json::json!({
                    "model_id": entry.id,
                    "task_type": obs.task_type,
                    "streak": streak + 1,
                });
                let id = sha256_hex(format!("probation:{}:{}", entry.id, details).as_bytes())[..16]
                    .to_string();
                self.storage
                    .enqueue_action(HrAction {
                        id,
                        model_id: entry.id.clone(),
                        action: HrActionKind::Probation,
                        reason: "quality_regression".to_string(),
                        recommended_by: RecommendedBy::Evaluation,
                        approved: None,
                        approved_by: None,
                        rejected_by: None,
                        rejection_reason: None,
                        ts: crate::domain::now(),
                    })
                    .await;
            }
        }

        obs.model_id = entry.id;
        self.storage.append_observation(obs, self.observation_cap).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::*;
    use crate::registry::storage::FileStorage;
    use std::collections::HashMap;

    async fn seeded(dir: &std::path::Path) -> Arc<FileStorage> {
        let storage = Arc::new(FileStorage::open(dir).await);
        let now = now();
        storage
            .upsert_model(ModelRegistryEntry {
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
            })
            .await;
        storage
    }

    fn obs(quality: f64) -> ModelObservation {
        ModelObservation {
            model_id: "openai/gpt-4o".to_string(),
            task_type: "code".to_string(),
            difficulty: "medium".to_string(),
            actual_cost_usd: 0.01,
            predicted_cost_usd: 0.01,
            actual_quality: quality,
            predicted_quality: 0.8,
            ts: now(),
            run_session_id: None,
            package_id: None,
            defect_count: None,
            qa_mode: QaMode::Deterministic,
            deterministic_no_signal: false,
            budget_gated: false,
        }
    }

    #[tokio::test]
    async fn updates_quality_prior_towards_observation() {
        let dir = tempfile::tempdir().unwrap();
        let storage = seeded(dir.path()).await;
        let svc = EvaluationService::new(storage.clone(), 1000);
        svc.record_observation(obs(0.95)).await.unwrap();
        let entry = storage.get_model("openai/gpt-4o").await.unwrap();
        let prior = entry.prior_for("code", "medium").unwrap();
        assert!(prior.quality_prior > 0.5);
        assert_eq!(prior.sample_count, 1);
    }

    #[tokio::test]
    async fn three_low_quality_observations_trigger_probation_action() {
        let dir = tempfile::tempdir().unwrap();
        let storage = seeded(dir.path()).await;
        let svc = EvaluationService::new(storage.clone(), 1000);
        for _ in 0..3 {
            svc.record_observation(obs(0.2)).await.unwrap();
        }
        let actions = storage.list_actions(10, 30).await;
        assert!(actions.iter().any(|a| a.action == HrActionKind::Probation));
    }

    #[tokio::test]
    async fn deterministic_no_signal_skips_prior_update() {
        let dir = tempfile::tempdir().unwrap();
        let storage = seeded(dir.path()).await;
        let svc = EvaluationService::new(storage.clone(), 1000);
        let mut o = obs(0.95);
        o.deterministic_no_signal = true;
        svc.record_observation(o).await.unwrap();
        let entry = storage.get_model("openai/gpt-4o").await.unwrap();
        assert!(entry.prior_for("code", "medium").is_none());
    }
}
