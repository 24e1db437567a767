//! Portfolio recommendation cache.
//!
//! Computing the 5-slot portfolio re-ranks the whole registry, so it is
//! cached for `ttl` and recomputed at most once concurrently: a second
//! caller arriving while a refresh is in flight awaits the same future
//! rather than starting its own (single-flight), using a guarded
//! recompute pattern built on `tokio::sync::Mutex`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::domain::{PortfolioMode, PortfolioRecommendation, TierProfile};
use crate::registry::{compute_model_score, is_eligible, EligibilityContext, Storage};

struct CacheEntry {
    recommendation: PortfolioRecommendation,
    computed_at: Instant,
}

pub struct PortfolioCache {
    storage: Arc<dyn Storage>,
    ttl: Duration,
    cached: Mutex<Option<CacheEntry>>,
}

impl PortfolioCache {
    pub fn new(storage: Arc<dyn Storage>, ttl: Duration) -> Self {
        Self {
            storage,
            ttl,
            cached: Mutex::new(None),
        }
    }

    /// Returns the cached recommendation if still fresh, otherwise recomputes
    /// it while holding the lock so concurrent callers single-flight.
    pub async fn get(&self, mode: PortfolioMode) -> PortfolioRecommendation {
        if mode == PortfolioMode::Off {
            return PortfolioRecommendation::default();
        }

        let mut guard = self.cached.lock().await;
        if let Some(entry) = guard.as_ref() {
            if entry.computed_at.elapsed() < self.ttl {
                return entry.recommendation.clone();
            }
        }

        let recommendation = self.compute().await;
        *guard = Some(CacheEntry {
            recommendation: recommendation.clone(),
            computed_at: Instant::now(),
        });
        recommendation
    }

    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    async fn compute(&self) -> PortfolioRecommendation {
        let models = self.storage.list_models(&Default::default()).await;

        let pick = |task_type: &str, tier: TierProfile| -> Option<String> {
            models
                .iter()
                .filter(|m| {
                    is_eligible(
                        m,
                        &EligibilityContext {
                            task_type,
                            tier,
                            package_budget_usd: tier.threshold_usd(),
                            importance: 0.5,
                            tenant_config: None,
                            use_case_tags: &[],
                        },
                    )
                    .is_eligible()
                })
                .map(|m| {
                    let score = compute_model_score(m, task_type, "medium", tier, tier.threshold_usd() * 0.5);
                    (m.id.clone(), score.total)
                })
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
                .map(|(id, _)| id)
        };

        PortfolioRecommendation {
            worker_cheap: pick("general", TierProfile::Cheap),
            worker_implementation: pick("code", TierProfile::Standard),
            worker_strategy: pick("planning", TierProfile::Premium),
            qa_primary: pick("qa", TierProfile::Standard),
            qa_backup: pick("qa", TierProfile::Cheap),
        }
    }
}

/// Checks that every slot in `recommendation` names a model still present in
/// the current registry. Returns the missing ids, if any.
pub fn validate_portfolio_coverage(
    recommendation: &PortfolioRecommendation,
    known_model_ids: &std::collections::HashSet<String>,
) -> Result<(), Vec<String>> {
    let missing: Vec<String> = recommendation
        .slot_ids()
        .into_iter()
        .filter(|id| !known_model_ids.contains(*id))
        .map(|id| id.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::*;
    use crate::registry::FileStorage;
    use std::collections::HashMap;

    fn model(id: &str, task_type: &str, expertise: f64) -> ModelRegistryEntry {
        let now = now();
        ModelRegistryEntry {
            id: id.to_string(),
            identity: ModelIdentity {
                provider: id.split('/').next().unwrap().to_string(),
                model_id: id.split('/').nth(1).unwrap().to_string(),
                status: ModelStatus::Active,
                aliases: Vec::new(),
                disabled_reason: None,
                disabled_at: None,
            },
            pricing: ModelPricing {
                in_per_1k: 0.001,
                out_per_1k: 0.002,
                currency: Currency::Usd,
                min_charge_usd: None,
            },
            expertise: [(task_type.to_string(), expertise)].into_iter().collect::<HashMap<_, _>>(),
            reliability: 0.8,
            capabilities: Vec::new(),
            guardrails: Guardrails::default(),
            governance: Governance::default(),
            performance_priors: Vec::new(),
            evaluation_meta: EvaluationMeta::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn off_mode_returns_empty_recommendation() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(FileStorage::open(dir.path()).await);
        let cache = PortfolioCache::new(storage, Duration::from_secs(60));
        let rec = cache.get(PortfolioMode::Off).await;
        assert!(rec.slot_ids().is_empty());
    }

    #[tokio::test]
    async fn fills_slots_from_eligible_models() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(FileStorage::open(dir.path()).await);
        storage.upsert_model(model("openai/gpt-4o-mini", "general", 0.7)).await;
        storage.upsert_model(model("openai/gpt-4o", "code", 0.8)).await;
        let cache = PortfolioCache::new(storage, Duration::from_secs(60));
        let rec = cache.get(PortfolioMode::Prefer).await;
        assert_eq!(rec.worker_cheap.as_deref(), Some("openai/gpt-4o-mini"));
        assert_eq!(rec.worker_implementation.as_deref(), Some("openai/gpt-4o"));
    }

    #[tokio::test]
    async fn cache_is_reused_within_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(FileStorage::open(dir.path()).await);
        storage.upsert_model(model("openai/gpt-4o-mini", "general", 0.7)).await;
        let cache = PortfolioCache::new(storage.clone(), Duration::from_secs(60));
        let first = cache.get(PortfolioMode::Prefer).await;
        storage.disable_model("openai/gpt-4o-mini", "test").await;
        let second = cache.get(PortfolioMode::Prefer).await;
        assert_eq!(first.worker_cheap, second.worker_cheap);
    }

    #[test]
    fn coverage_check_flags_missing_slot_models() {
        let rec = PortfolioRecommendation {
            worker_cheap: Some("openai/gpt-4o-mini".to_string()),
            worker_implementation: Some("openai/gpt-5".to_string()),
            worker_strategy: None,
            qa_primary: None,
            qa_backup: None,
        };
        let known: std::collections::HashSet<String> =
            ["openai/gpt-4o-mini".to_string()].into_iter().collect();
        let err = validate_portfolio_coverage(&rec, &known).unwrap_err();
        assert_eq!(err, vec!["openai/gpt-5".to_string()]);
    }

    #[test]
    fn coverage_check_passes_when_every_slot_is_known() {
        let rec = PortfolioRecommendation {
            worker_cheap: Some("openai/gpt-4o-mini".to_string()),
            worker_implementation: None,
            worker_strategy: None,
            qa_primary: None,
            qa_backup: None,
        };
        let known: std::collections::HashSet<String> =
            ["openai/gpt-4o-mini".to_string()].into_iter().collect();
        assert!(validate_portfolio_coverage(&rec, &known).is_ok());
    }
}
