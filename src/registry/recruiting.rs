//! Recruiting — diffing a provider's catalog entry against the registry.
//!
//! A freshly listed provider/model pair is either brand new, a pricing
//! update on a known model, a metadata-only update, or an exact match. New
//! models are recruited on probation with conservative starting priors and
//! a `model_created` signal; existing models keep their accumulated priors
//! across a pricing or metadata change.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::{
    EvaluationMeta, Guardrails, Governance, HrSignal, ModelIdentity, ModelPricing,
    ModelRegistryEntry, ModelStatus,
};
use crate::registry::storage::Storage;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCatalogEntry {
    pub provider: String,
    pub model_id: String,
    pub pricing: ModelPricing,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecruitingDiff {
    New,
    PricingChanged,
    MetadataChanged,
    Unchanged,
}

fn classify(existing: &ModelRegistryEntry, catalog: &ProviderCatalogEntry) -> RecruitingDiff {
    if existing.pricing.in_per_1k != catalog.pricing.in_per_1k
        || existing.pricing.out_per_1k != catalog.pricing.out_per_1k
    {
        RecruitingDiff::PricingChanged
    } else if existing.capabilities != catalog.capabilities
        || existing.identity.aliases != catalog.aliases
    {
        RecruitingDiff::MetadataChanged
    } else {
        RecruitingDiff::Unchanged
    }
}

/// Diffs `catalog` against the registry and applies the matching update,
/// returning the resulting diff kind and (when changed) the stored entry.
pub async fn process_provider_model(
    storage: &Arc<dyn Storage>,
    catalog: ProviderCatalogEntry,
) -> (RecruitingDiff, Option<ModelRegistryEntry>) {
    let canonical = crate::domain::canonical_id(&catalog.provider, &catalog.model_id);

    match storage.get_model(&canonical).await {
        None => {
            let now = crate::domain::now();
            let entry = ModelRegistryEntry {
                id: canonical.clone(),
                identity: ModelIdentity {
                    provider: catalog.provider,
                    model_id: catalog.model_id,
                    status: ModelStatus::Probation,
                    aliases: catalog.aliases,
                    disabled_reason: None,
                    disabled_at: None,
                },
                pricing: catalog.pricing,
                expertise: Default::default(),
                reliability: 0.5,
                capabilities: catalog.capabilities,
                guardrails: Guardrails::default(),
                governance: Governance::default(),
                performance_priors: Vec::new(),
                evaluation_meta: EvaluationMeta::default(),
                created_at: now,
                updated_at: now,
            };
            let stored = storage.upsert_model(entry).await;
            storage
                .append_signal(HrSignal {
                    model_id: canonical,
                    previous_status: None,
                    new_status: Some(ModelStatus::Probation),
                    reason: "model_created".to_string(),
                    ts: now,
                    context: None,
                })
                .await;
            (RecruitingDiff::New, Some(stored))
        }
        Some(mut existing) => {
            let diff = classify(&existing, &catalog);
            match diff {
                RecruitingDiff::Unchanged => (diff, None),
                RecruitingDiff::PricingChanged => {
                    existing.pricing = catalog.pricing;
                    let status = existing.identity.status;
                    let id = existing.id.clone();
                    let stored = storage.upsert_model(existing).await;
                    storage
                        .append_signal(HrSignal {
                            model_id: id,
                            previous_status: Some(status),
                            new_status: Some(status),
                            reason: "pricing_changed".to_string(),
                            ts: crate::domain::now(),
                            context: None,
                        })
                        .await;
                    (diff, Some(stored))
                }
                RecruitingDiff::MetadataChanged => {
                    existing.capabilities = catalog.capabilities;
                    existing.identity.aliases = catalog.aliases;
                    let stored = storage.upsert_model(existing).await;
                    (diff, Some(stored))
                }
                RecruitingDiff::New => unreachable!(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Currency;
    use crate::registry::storage::FileStorage;

    fn catalog() -> ProviderCatalogEntry {
        ProviderCatalogEntry {
            provider: "openai".to_string(),
            model_id: "gpt-4o".to_string(),
            pricing: ModelPricing {
                in_per_1k: 0.005,
                out_per_1k: 0.015,
                currency: Currency::Usd,
                min_charge_usd: None,
            },
            capabilities: vec!["json_mode".to_string()],
            aliases: Vec::new(),
        }
    }

    #[tokio::test]
    async fn new_model_is_recruited() {
        let dir = tempfile::tempdir().unwrap();
        let storage: Arc<dyn Storage> = Arc::new(FileStorage::open(dir.path()).await);
        let (diff, entry) = process_provider_model(&storage, catalog()).await;
        assert_eq!(diff, RecruitingDiff::New);
        let entry = entry.unwrap();
        assert_eq!(entry.id, "openai/gpt-4o");
        assert_eq!(entry.identity.status, ModelStatus::Probation);

        let signals = storage.list_signals(Some(&entry.id), 365).await;
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].reason, "model_created");
        assert_eq!(signals[0].previous_status, None);
        assert_eq!(signals[0].new_status, Some(ModelStatus::Probation));
    }

    #[tokio::test]
    async fn pricing_change_is_detected_and_priors_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let storage: Arc<dyn Storage> = Arc::new(FileStorage::open(dir.path()).await);
        let (_, entry) = process_provider_model(&storage, catalog()).await;
        let mut entry = entry.unwrap();
        entry.prior_for_mut("code", "medium").quality_prior = 0.9;
        storage.upsert_model(entry).await;

        let mut changed = catalog();
        changed.pricing.in_per_1k = 0.01;
        let (diff, updated) = process_provider_model(&storage, changed).await;
        assert_eq!(diff, RecruitingDiff::PricingChanged);
        let updated = updated.unwrap();
        assert_eq!(updated.pricing.in_per_1k, 0.01);
        assert_eq!(updated.prior_for("code", "medium").unwrap().quality_prior, 0.9);
    }

    #[tokio::test]
    async fn unchanged_catalog_entry_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let storage: Arc<dyn Storage> = Arc::new(FileStorage::open(dir.path()).await);
        process_provider_model(&storage, catalog()).await;
        let (diff, entry) = process_provider_model(&storage, catalog()).await;
        assert_eq!(diff, RecruitingDiff::Unchanged);
        assert!(entry.is_none());
    }
}
