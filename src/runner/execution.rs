//! Per-package execution: route, run the worker, fan in a QA pass, validate
//! an aggregation-report output when one is produced, and escalate to the
//! next tier on rejection up to a retry ceiling.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::assembler::{validate_aggregation_report, AggregationReport};
use crate::collaborators::{ExecStatus, ExecuteOptions, LlmExecutor};
use crate::domain::{
    AtomicWorkPackage, CostKind, DecisionType, ModelObservation, PackageRole, PackageState,
    QaMode, RoleExecution, TenantProcurementConfig, TierProfile,
};
use crate::ledger::LedgerStore;
use crate::registry::EvaluationService;
use crate::router::{RouteDecision, Router, RoutingOptions};

/// Escalations attempted before a package is marked failed.
const MAX_ESCALATIONS: u32 = 2;

/// QA quality score below which a package is escalated to the next tier.
const ESCALATION_THRESHOLD: f64 = 0.60;

/// Minimum remaining per-package budget headroom required to afford an LLM
/// QA judge call; below this the QA pass degrades to a no-signal pass-through.
const QA_BUDGET_HEADROOM_USD: f64 = 0.0001;

#[derive(Debug, Clone)]
pub struct PackageOutcome {
    pub package_id: String,
    pub state: PackageState,
    pub model_id: Option<String>,
    pub output: Option<String>,
    pub escalations: u32,
    pub quality_score: Option<f64>,
    pub skip_reason: Option<String>,
}

pub struct PackageExecutor {
    router: Arc<Router>,
    executor: Arc<dyn LlmExecutor>,
    ledger: Arc<LedgerStore>,
    evaluation: Arc<EvaluationService>,
}

impl PackageExecutor {
    pub fn new(
        router: Arc<Router>,
        executor: Arc<dyn LlmExecutor>,
        ledger: Arc<LedgerStore>,
        evaluation: Arc<EvaluationService>,
    ) -> Self {
        Self {
            router,
            executor,
            ledger,
            evaluation,
        }
    }

    pub async fn execute(
        &self,
        run_session_id: &str,
        package: &AtomicWorkPackage,
        package_budget_usd: f64,
        tenant_config: Option<&TenantProcurementConfig>,
        routing: &RoutingOptions<'_>,
        known_package_ids: &HashSet<String>,
    ) -> PackageOutcome {
        let mut tier = package.tier_profile_override.unwrap_or(TierProfile::Standard);
        let mut escalations = 0u32;

        loop {
            let mut escalated_package = package.clone();
            escalated_package.tier_profile_override = Some(tier);

            let decision = match self
                .router
                .route(&escalated_package, package_budget_usd, tenant_config, routing)
                .await
            {
                Ok(d) => d,
                Err(err) => {
                    self.ledger
                        .record_decision(
                            run_session_id,
                            DecisionType::Route,
                            Some(package.id.clone()),
                            serde_json::json!({"error": err.to_string()}),
                        )
                        .await;
                    return PackageOutcome {
                        package_id: package.id.clone(),
                        state: PackageState::Failed,
                        model_id: None,
                        output: None,
                        escalations,
                        quality_score: None,
                        skip_reason: None,
                    };
                }
            };

            self.ledger
                .record_decision(
                    run_session_id,
                    DecisionType::Route,
                    Some(package.id.clone()),
                    serde_json::json!({
                        "model_id": decision.model_id,
                        "predicted_cost_usd": decision.predicted_cost_usd,
                        "tier": format!("{:?}", tier),
                        "portfolio_bypassed": decision.portfolio_bypassed,
                        "bypass_reason": decision.bypass_reason,
                    }),
                )
                .await;

            let started = Instant::now();
            let prompt = format!("{}\n\n{:?}", package.name, package.acceptance_criteria);
            let result = self
                .executor
                .execute_text(&decision.model_id, &prompt, ExecuteOptions::default())
                .await;

            let duration_ms = started.elapsed().as_millis() as u64;
            self.ledger
                .record_role_execution(
                    run_session_id,
                    RoleExecution {
                        package_id: package.id.clone(),
                        role: format!("{:?}", package.role),
                        model_id: decision.model_id.clone(),
                        duration_ms,
                    },
                )
                .await;

            let cost_kind = match package.role {
                PackageRole::Worker => CostKind::Worker,
                PackageRole::Qa => CostKind::Qa,
            };
            self.ledger
                .record_cost(run_session_id, cost_kind, decision.predicted_cost_usd)
                .await;

            let exec = match result {
                Ok(exec) if exec.status == ExecStatus::Ok => exec,
                _ => {
                    let escalated = self
                        .escalate_or_fail(
                            run_session_id,
                            package,
                            &decision,
                            &mut tier,
                            &mut escalations,
                        )
                        .await;
                    if let Some(outcome) = escalated {
                        return outcome;
                    }
                    continue;
                }
            };

            if package.role == PackageRole::Worker {
                let quality = self
                    .fan_in_qa(
                        run_session_id,
                        package,
                        package_budget_usd,
                        &decision,
                        &exec.text,
                        known_package_ids,
                    )
                    .await;

                if quality.is_some_and(|q| q < ESCALATION_THRESHOLD) {
                    self.ledger
                        .record_decision(
                            run_session_id,
                            DecisionType::Escalation,
                            Some(package.id.clone()),
                            serde_json::json!({
                                "reason": "quality_below_threshold",
                                "quality_score": quality,
                            }),
                        )
                        .await;
                    let escalated = self
                        .escalate_or_fail(
                            run_session_id,
                            package,
                            &decision,
                            &mut tier,
                            &mut escalations,
                        )
                        .await;
                    if let Some(mut outcome) = escalated {
                        outcome.quality_score = quality;
                        return outcome;
                    }
                    continue;
                }

                return PackageOutcome {
                    package_id: package.id.clone(),
                    state: PackageState::Completed,
                    model_id: Some(decision.model_id),
                    output: Some(exec.text),
                    escalations,
                    quality_score: quality,
                    skip_reason: None,
                };
            }

            return PackageOutcome {
                package_id: package.id.clone(),
                state: PackageState::Completed,
                model_id: Some(decision.model_id),
                output: Some(exec.text),
                escalations,
                quality_score: None,
                skip_reason: None,
            };
        }
    }

    /// Runs the QA pass for a completed worker package.
    ///
    /// An output that parses as an aggregation report is validated; a
    /// validation failure is a hard defect (`Some(0.0)`). Otherwise, when
    /// there is enough remaining package-budget headroom, an LLM judge rates
    /// quality; when the judge call fails to produce a strict score, or
    /// there isn't enough headroom to afford it, the pass degrades to a
    /// no-signal pass-through (`None` — not escalated, not learned from).
    /// Every path but the pass-through records a `ModelObservation`.
    async fn fan_in_qa(
        &self,
        run_session_id: &str,
        package: &AtomicWorkPackage,
        package_budget_usd: f64,
        decision: &RouteDecision,
        output_text: &str,
        known_package_ids: &HashSet<String>,
    ) -> Option<f64> {
        if let Ok(report) = serde_json::from_str::<AggregationReport>(output_text) {
            if validate_aggregation_report(&report, known_package_ids).is_err() {
                self.evaluation
                    .record_observation(ModelObservation {
                        model_id: decision.model_id.clone(),
                        task_type: package.task_type.clone(),
                        difficulty: package.difficulty.clone(),
                        actual_cost_usd: decision.predicted_cost_usd,
                        predicted_cost_usd: decision.predicted_cost_usd,
                        actual_quality: 0.0,
                        predicted_quality: decision.score.total,
                        ts: crate::domain::now(),
                        run_session_id: Some(run_session_id.to_string()),
                        package_id: Some(package.id.clone()),
                        defect_count: Some(1),
                        qa_mode: QaMode::Deterministic,
                        deterministic_no_signal: false,
                        budget_gated: false,
                    })
                    .await
                    .ok();
                return Some(0.0);
            }
        }

        let headroom = package_budget_usd - decision.predicted_cost_usd;
        if headroom < QA_BUDGET_HEADROOM_USD {
            self.record_no_signal(run_session_id, package, decision, true).await;
            return None;
        }

        let prompt = format!(
            "Rate the quality of this output on a 0.0-1.0 scale and list any defects.\n\nOutput:\n{output_text}"
        );
        match self
            .executor
            .execute_json_strict(&decision.model_id, &prompt, "{quality_score: number, defects: string[]}")
            .await
        {
            Ok(value) => {
                let score = match value.get("quality_score").and_then(|v| v.as_f64()) {
                    Some(s) => s.clamp(0.0, 1.0),
                    None => {
                        self.record_no_signal(run_session_id, package, decision, false).await;
                        return None;
                    }
                };
                let defects = value
                    .get("defects")
                    .and_then(|v| v.as_array())
                    .map(|a| a.len() as u32)
                    .unwrap_or(0);
                self.evaluation
                    .record_observation(ModelObservation {
                        model_id: decision.model_id.clone(),
                        task_type: package.task_type.clone(),
                        difficulty: package.difficulty.clone(),
                        actual_cost_usd: decision.predicted_cost_usd,
                        predicted_cost_usd: decision.predicted_cost_usd,
                        actual_quality: score,
                        predicted_quality: decision.score.total,
                        ts: crate::domain::now(),
                        run_session_id: Some(run_session_id.to_string()),
                        package_id: Some(package.id.clone()),
                        defect_count: Some(defects),
                        qa_mode: QaMode::Llm,
                        deterministic_no_signal: false,
                        budget_gated: false,
                    })
                    .await
                    .ok();
                Some(score)
            }
            Err(_) => {
                self.record_no_signal(run_session_id, package, decision, false).await;
                None
            }
        }
    }

    async fn record_no_signal(
        &self,
        run_session_id: &str,
        package: &AtomicWorkPackage,
        decision: &RouteDecision,
        budget_gated: bool,
    ) {
        self.evaluation
            .record_observation(ModelObservation {
                model_id: decision.model_id.clone(),
                task_type: package.task_type.clone(),
                difficulty: package.difficulty.clone(),
                actual_cost_usd: decision.predicted_cost_usd,
                predicted_cost_usd: decision.predicted_cost_usd,
                actual_quality: decision.score.total,
                predicted_quality: decision.score.total,
                ts: crate::domain::now(),
                run_session_id: Some(run_session_id.to_string()),
                package_id: Some(package.id.clone()),
                defect_count: None,
                qa_mode: QaMode::Deterministic,
                deterministic_no_signal: true,
                budget_gated,
            })
            .await
            .ok();
    }

    /// Escalates to the next tier, or returns a `Failed` outcome once the
    /// ceiling (or the top tier) is reached.
    async fn escalate_or_fail(
        &self,
        run_session_id: &str,
        package: &AtomicWorkPackage,
        decision: &RouteDecision,
        tier: &mut TierProfile,
        escalations: &mut u32,
    ) -> Option<PackageOutcome> {
        *escalations += 1;
        if *escalations > MAX_ESCALATIONS || *tier == TierProfile::Premium {
            return Some(PackageOutcome {
                package_id: package.id.clone(),
                state: PackageState::Failed,
                model_id: Some(decision.model_id.clone()),
                output: None,
                escalations: *escalations,
                quality_score: None,
                skip_reason: None,
            });
        }
        *tier = tier.escalate();
        self.ledger
            .record_decision(
                run_session_id,
                DecisionType::Escalation,
                Some(package.id.clone()),
                serde_json::json!({"new_tier": format!("{:?}", tier)}),
            )
            .await;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::MockLlmExecutor;
    use crate::domain::*;
    use crate::ledger::LedgerStore;
    use crate::registry::{EvaluationService, FileStorage};
    use std::collections::HashMap;

    fn package() -> AtomicWorkPackage {
        AtomicWorkPackage {
            id: "p1".to_string(),
            role: PackageRole::Worker,
            name: "implement thing".to_string(),
            acceptance_criteria: vec!["compiles".to_string()],
            inputs: HashMap::new(),
            outputs: HashMap::new(),
            dependencies: Vec::new(),
            estimated_tokens: EstimatedTokens { input: 200, output: 200 },
            tier_profile_override: Some(TierProfile::Cheap),
            task_type: "code".to_string(),
            difficulty: "medium".to_string(),
            use_case_tags: Vec::new(),
        }
    }

    async fn model_entry() -> ModelRegistryEntry {
        let now = now();
        ModelRegistryEntry {
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
                in_per_1k: 0.0002,
                out_per_1k: 0.0006,
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
        }
    }

    #[tokio::test]
    async fn successful_execution_completes_package() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(FileStorage::open(dir.path()).await);
        storage.upsert_model(model_entry().await).await;
        let router = Arc::new(Router::new(storage.clone()));
        let ledger = Arc::new(LedgerStore::new(200, 200));
        ledger.create_ledger("run-1".to_string()).await;
        let mock = Arc::new(MockLlmExecutor::new("done"));
        let evaluation = Arc::new(EvaluationService::new(storage, 500));

        let exec = PackageExecutor::new(router, mock, ledger.clone(), evaluation);
        let outcome = exec
            .execute("run-1", &package(), 1.0, None, &RoutingOptions::default(), &HashSet::new())
            .await;
        assert_eq!(outcome.state, PackageState::Completed);
        assert_eq!(outcome.escalations, 0);

        let l = ledger.get_ledger("run-1").await.unwrap();
        assert!(l.costs.worker_usd > 0.0);
        assert!(!l.role_executions.is_empty());
    }

    #[tokio::test]
    async fn routing_failure_marks_package_failed() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(FileStorage::open(dir.path()).await);
        let router = Arc::new(Router::new(storage.clone()));
        let ledger = Arc::new(LedgerStore::new(200, 200));
        ledger.create_ledger("run-1".to_string()).await;
        let mock = Arc::new(MockLlmExecutor::new("done"));
        let evaluation = Arc::new(EvaluationService::new(storage, 500));

        let exec = PackageExecutor::new(router, mock, ledger, evaluation);
        let outcome = exec
            .execute("run-1", &package(), 1.0, None, &RoutingOptions::default(), &HashSet::new())
            .await;
        assert_eq!(outcome.state, PackageState::Failed);
    }

    #[tokio::test]
    async fn invalid_aggregation_report_output_escalates_then_fails() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(FileStorage::open(dir.path()).await);
        storage.upsert_model(model_entry().await).await;
        let router = Arc::new(Router::new(storage.clone()));
        let ledger = Arc::new(LedgerStore::new(200, 200));
        ledger.create_ledger("run-1".to_string()).await;

        let bad_report = serde_json::json!({
            "run_session_id": "run-1",
            "package_id": "p1",
            "files": [{"path": "package.json", "content": "{}"}],
        })
        .to_string();
        let mock = Arc::new(MockLlmExecutor::new(bad_report));
        let evaluation = Arc::new(EvaluationService::new(storage, 500));

        let exec = PackageExecutor::new(router, mock, ledger, evaluation);
        let known: HashSet<String> = ["p1".to_string()].into_iter().collect();
        let outcome = exec
            .execute("run-1", &package(), 1.0, None, &RoutingOptions::default(), &known)
            .await;
        assert_eq!(outcome.state, PackageState::Failed);
        assert_eq!(outcome.quality_score, Some(0.0));
    }

    #[tokio::test]
    async fn tight_budget_skips_the_qa_judge_without_escalating() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(FileStorage::open(dir.path()).await);
        storage.upsert_model(model_entry().await).await;
        let router = Arc::new(Router::new(storage.clone()));
        let ledger = Arc::new(LedgerStore::new(200, 200));
        ledger.create_ledger("run-1".to_string()).await;
        let mock = Arc::new(MockLlmExecutor::new("plain text output"));
        let evaluation = Arc::new(EvaluationService::new(storage, 500));

        let exec = PackageExecutor::new(router, mock, ledger, evaluation);
        let outcome = exec
            .execute("run-1", &package(), 0.0002, None, &RoutingOptions::default(), &HashSet::new())
            .await;
        assert_eq!(outcome.state, PackageState::Completed);
        assert_eq!(outcome.escalations, 0);
        assert!(outcome.quality_score.is_none());
    }

    #[tokio::test]
    async fn non_json_qa_response_degrades_to_pass_through_not_escalation() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(FileStorage::open(dir.path()).await);
        storage.upsert_model(model_entry().await).await;
        let router = Arc::new(Router::new(storage.clone()));
        let ledger = Arc::new(LedgerStore::new(200, 200));
        ledger.create_ledger("run-1".to_string()).await;
        let mock = Arc::new(MockLlmExecutor::new("plain text output"));
        let evaluation = Arc::new(EvaluationService::new(storage, 500));

        let exec = PackageExecutor::new(router, mock, ledger, evaluation);
        let outcome = exec
            .execute("run-1", &package(), 1.0, None, &RoutingOptions::default(), &HashSet::new())
            .await;
        assert_eq!(outcome.state, PackageState::Completed);
        assert_eq!(outcome.escalations, 0);
        assert!(outcome.quality_score.is_none());
    }
}
