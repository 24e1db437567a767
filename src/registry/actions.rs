//! HR actions queue — approve/reject workflow for recommended HR actions.
//!
//! Approving or rejecting an already-resolved action is idempotent: it
//! returns the existing resolution rather than re-applying the effect, so a
//! retried operator request can never flip a decision twice.

use std::sync::Arc;

use crate::domain::{HrActionKind, HrSignal, ModelStatus};
use crate::error::{AppError, AppResult};
use crate::registry::storage::Storage;

pub struct HrActionQueue {
    storage: Arc<dyn Storage>,
    retention_days: i64,
}

impl HrActionQueue {
    pub fn new(storage: Arc<dyn Storage>, retention_days: i64) -> Self {
        Self {
            storage,
            retention_days,
        }
    }

    pub async fn list(&self, limit: usize) -> Vec<crate::domain::HrAction> {
        self.storage.list_actions(limit, self.retention_days).await
    }

    /// Approves `action_id`, applying its effect to the model's status.
    /// Already-approved actions return their existing record unchanged.
    pub async fn approve(&self, action_id: &str, approved_by: &str) -> AppResult<crate::domain::HrAction> {
        let mut action = self
            .storage
            .get_action(action_id)
            .await
            .ok_or_else(|| AppError::not_found("hr_action", action_id))?;

        if action.is_resolved() {
            return Ok(action);
        }

        let new_status = match action.action {
            HrActionKind::Probation => Some(ModelStatus::Probation),
            HrActionKind::Disable => Some(ModelStatus::Disabled),
            HrActionKind::Activate => Some(ModelStatus::Active),
            HrActionKind::KillSwitch => Some(ModelStatus::Disabled),
        };

        if let Some(status) = new_status {
            let applied = if status == ModelStatus::Disabled {
                self.storage.disable_model(&action.model_id, &action.reason).await
            } else {
                self.storage.set_model_status(&action.model_id, status).await
            };
            let Some(applied) = applied else {
                return Err(AppError::approve_failed(format!(
                    "model {} no longer exists",
                    action.model_id
                )));
            };
            self.storage
                .append_signal(HrSignal {
                    model_id: applied.id.clone(),
                    previous_status: None,
                    new_status: Some(applied.identity.status),
                    reason: format!("hr_action_approved:{}", action.reason),
                    ts: crate::domain::now(),
                    context: None,
                })
                .await;
        }

        action.approved = Some(true);
        action.approved_by = Some(approved_by.to_string());
        self.storage.update_action(action.clone()).await;
        Ok(action)
    }

    /// Rejects `action_id` without applying any effect. Already-rejected
    /// actions return their existing record unchanged.
    pub async fn reject(
        &self,
        action_id: &str,
        rejected_by: &str,
        reason: &str,
    ) -> AppResult<crate::domain::HrAction> {
        let mut action = self
            .storage
            .get_action(action_id)
            .await
            .ok_or_else(|| AppError::not_found("hr_action", action_id))?;

        if action.is_resolved() {
            return Ok(action);
        }

        action.approved = Some(false);
        action.rejected_by = Some(rejected_by.to_string());
        action.rejection_reason = Some(reason.to_string());
        self.storage.update_action(action.clone()).await;
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::*;
    use crate::registry::storage::FileStorage;
    use std::collections::HashMap;

    async fn seeded() -> (tempfile::TempDir, Arc<FileStorage>) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(FileStorage::open(dir.path()).await);
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
                reliability: 0.8,
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
            .enqueue_action(HrAction {
                id: "a1".to_string(),
                model_id: "openai/gpt-4o".to_string(),
                action: HrActionKind::Probation,
                reason: "quality_regression".to_string(),
                recommended_by: RecommendedBy::Evaluation,
                approved: None,
                approved_by: None,
                rejected_by: None,
                rejection_reason: None,
                ts: now,
            })
            .await;
        (dir, storage)
    }

    #[tokio::test]
    async fn approve_applies_status_change() {
        let (_dir, storage) = seeded().await;
        let queue = HrActionQueue::new(storage.clone(), 90);
        let action = queue.approve("a1", "ops@example.com").await.unwrap();
        assert_eq!(action.approved, Some(true));
        let model = storage.get_model("openai/gpt-4o").await.unwrap();
        assert_eq!(model.identity.status, ModelStatus::Probation);
    }

    #[tokio::test]
    async fn approve_is_idempotent_on_second_call() {
        let (_dir, storage) = seeded().await;
        let queue = HrActionQueue::new(storage.clone(), 90);
        queue.approve("a1", "ops@example.com").await.unwrap();
        let second = queue.approve("a1", "someone-else@example.com").await.unwrap();
        assert_eq!(second.approved_by, Some("ops@example.com".to_string()));
    }

    #[tokio::test]
    async fn reject_leaves_model_status_untouched() {
        let (_dir, storage) = seeded().await;
        let queue = HrActionQueue::new(storage.clone(), 90);
        queue.reject("a1", "ops@example.com", "too noisy a signal").await.unwrap();
        let model = storage.get_model("openai/gpt-4o").await.unwrap();
        assert_eq!(model.identity.status, ModelStatus::Active);
    }

    #[tokio::test]
    async fn approve_unknown_action_is_not_found() {
        let (_dir, storage) = seeded().await;
        let queue = HrActionQueue::new(storage, 90);
        let err = queue.approve("nope", "ops@example.com").await.unwrap_err();
        assert_eq!(err.code(), "not_found");
    }
}
