//! Model HR — registry, storage, policy, scoring, evaluation, canary,
//! recruiting and the HR action queue.

pub mod actions;
pub mod canary;
pub mod evaluation;
pub mod health;
pub mod policy;
pub mod recruiting;
pub mod scoring;
pub mod storage;

pub use actions::HrActionQueue;
pub use evaluation::EvaluationService;
pub use health::{registry_health, RegistryHealth, RegistryHealthStatus};
pub use policy::{is_eligible, EligibilityContext, EligibilityVerdict};
pub use recruiting::{process_provider_model, ProviderCatalogEntry, RecruitingDiff};
pub use scoring::{compute_model_score, ScoreBreakdown};
pub use storage::{DbStorage, FileStorage, ModelFilters, Storage};

/// Fallback registry used when the real storage layer is empty or errors.
pub fn fallback_models() -> Vec<crate::domain::ModelRegistryEntry> {
    use crate::domain::*;
    let now = now();
    vec![ModelRegistryEntry {
        id: "openai/gpt-4o-mini".to_string(),
        identity: ModelIdentity {
            provider: "openai".to_string(),
            model_id: "gpt-4o-mini".to_string(),
            status: ModelStatus::Active,
            aliases: Vec::new(),
            disabled_reason: None,
            disabled_at: None,
        },
        pricing: ModelPricing {
            in_per_1k: 0.00015,
            out_per_1k: 0.0006,
            currency: Currency::Usd,
            min_charge_usd: None,
        },
        expertise: [("general".to_string(), 0.6)].into_iter().collect(),
        reliability: 0.8,
        capabilities: Vec::new(),
        guardrails: Guardrails::default(),
        governance: Governance::default(),
        performance_priors: Vec::new(),
        evaluation_meta: EvaluationMeta::default(),
        created_at: now,
        updated_at: now,
    }]
}
