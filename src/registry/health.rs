//! Registry health — tracks how often the router had to fall back to the
//! hardcoded fallback registry because live storage returned nothing.

use serde::Serialize;

use crate::registry::storage::Storage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryHealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistryHealth {
    pub status: RegistryHealthStatus,
    pub fallback_count_24h: u64,
    pub live_model_count: usize,
}

/// Degraded once more than 3 fallback events have fired in the trailing 24h,
/// matching the registry's own three-strikes probation streak length.
const DEGRADED_FALLBACK_THRESHOLD: u64 = 3;

pub async fn registry_health(
    storage: &dyn Storage,
    live_model_count: usize,
) -> RegistryHealth {
    let fallback_count_24h = storage.fallback_count_24h().await;
    let status = if fallback_count_24h > DEGRADED_FALLBACK_THRESHOLD || live_model_count == 0 {
        RegistryHealthStatus::Degraded
    } else {
        RegistryHealthStatus::Healthy
    };
    RegistryHealth {
        status,
        fallback_count_24h,
        live_model_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::storage::FileStorage;

    #[tokio::test]
    async fn empty_storage_is_degraded() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).await;
        let health = registry_health(&storage, 0).await;
        assert_eq!(health.status, RegistryHealthStatus::Degraded);
    }

    #[tokio::test]
    async fn live_models_with_no_fallbacks_is_healthy() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).await;
        let health = registry_health(&storage, 5).await;
        assert_eq!(health.status, RegistryHealthStatus::Healthy);
    }

    #[tokio::test]
    async fn repeated_fallback_events_degrade_health() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).await;
        for _ in 0..4 {
            storage.record_fallback_event().await;
        }
        let health = registry_health(&storage, 5).await;
        assert_eq!(health.status, RegistryHealthStatus::Degraded);
    }
}
