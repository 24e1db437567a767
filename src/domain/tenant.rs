//! `TenantProcurementConfig`. Externally edited; filters registry at runtime.

use serde::{Deserialize, Serialize};

use crate::domain::TierProfile;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelAvailability {
    #[serde(default)]
    pub allowed_providers: Vec<String>,
    #[serde(default)]
    pub blocked_providers: Vec<String>,
    #[serde(default)]
    pub allowed_models: Vec<String>,
    #[serde(default)]
    pub blocked_models: Vec<String>,
    #[serde(default)]
    pub allowed_tiers: Option<Vec<TierProfile>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TenantProcurementConfig {
    pub tenant_id: String,
    #[serde(default)]
    pub provider_subscriptions: Vec<String>,
    #[serde(default)]
    pub model_availability: ModelAvailability,
    #[serde(default)]
    pub ignored_recommendation_model_ids: Vec<String>,
}

impl TenantProcurementConfig {
    pub fn allows_provider(&self, provider: &str) -> bool {
        if self.model_availability.blocked_providers.iter().any(|p| p == provider) {
            return false;
        }
        self.model_availability.allowed_providers.is_empty()
            || self
                .model_availability
                .allowed_providers
                .iter()
                .any(|p| p == provider)
    }

    pub fn allows_model(&self, canonical_id: &str) -> bool {
        if self.model_availability.blocked_models.iter().any(|m| m == canonical_id) {
            return false;
        }
        self.model_availability.allowed_models.is_empty()
            || self
                .model_availability
                .allowed_models
                .iter()
                .any(|m| m == canonical_id)
    }
}
