//! Literal end-to-end scenarios against the public API: recruiting, routing,
//! canary transitions, portfolio coverage, and the aggregation-report
//! validator.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use model_agency_core::assembler::{validate_aggregation_report, AggregationReport, FileEntry};
use model_agency_core::domain::*;
use model_agency_core::registry::canary::evaluate_suite_for_status_change;
use model_agency_core::registry::{process_provider_model, FileStorage, ProviderCatalogEntry, Storage};
use model_agency_core::router::{validate_portfolio_coverage, Router, RoutingOptions};

fn model_pricing(in_per_1k: f64, out_per_1k: f64) -> ModelPricing {
    ModelPricing {
        in_per_1k,
        out_per_1k,
        currency: Currency::Usd,
        min_charge_usd: None,
    }
}

fn package(task_type: &str, tier: TierProfile) -> AtomicWorkPackage {
    AtomicWorkPackage {
        id: "p1".to_string(),
        role: PackageRole::Worker,
        name: "implement thing".to_string(),
        acceptance_criteria: Vec::new(),
        inputs: HashMap::new(),
        outputs: HashMap::new(),
        dependencies: Vec::new(),
        estimated_tokens: EstimatedTokens { input: 500, output: 500 },
        tier_profile_override: Some(tier),
        task_type: task_type.to_string(),
        difficulty: "medium".to_string(),
        use_case_tags: Vec::new(),
    }
}

fn model_entry(id: &str, in_per_1k: f64, out_per_1k: f64, expertise: f64) -> ModelRegistryEntry {
    let now = now();
    let (provider, model_id) = id.split_once('/').unwrap();
    ModelRegistryEntry {
        id: id.to_string(),
        identity: ModelIdentity {
            provider: provider.to_string(),
            model_id: model_id.to_string(),
            status: ModelStatus::Active,
            aliases: Vec::new(),
            disabled_reason: None,
            disabled_at: None,
        },
        pricing: model_pricing(in_per_1k, out_per_1k),
        expertise: [("code".to_string(), expertise)].into_iter().collect(),
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

/// Scenario 1: recruiting a brand new model against an empty registry lands
/// it on probation with a `model_created` signal.
#[tokio::test]
async fn recruiting_new_model_lands_on_probation_with_a_signal() {
    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(FileStorage::open(dir.path()).await);

    let catalog = ProviderCatalogEntry {
        provider: "openai".to_string(),
        model_id: "gpt-4o".to_string(),
        pricing: model_pricing(0.0025, 0.01),
        capabilities: Vec::new(),
        aliases: Vec::new(),
    };
    let (diff, entry) = process_provider_model(&storage, catalog).await;

    assert_eq!(diff, RecruitingDiff::New);
    let entry = entry.unwrap();
    assert_eq!(entry.id, "openai/gpt-4o");
    assert_eq!(entry.identity.status, ModelStatus::Probation);
    assert_eq!(entry.evaluation_meta.canary_status, CanaryStatus::None);

    let signals = storage.list_signals(Some("openai/gpt-4o"), 365).await;
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].reason, "model_created");
    assert_eq!(signals[0].previous_status, None);
    assert_eq!(signals[0].new_status, Some(ModelStatus::Probation));
}

/// Scenario 2: a pricing-only change on an active model preserves its
/// accumulated priors and canary status, and emits a `pricing_changed`
/// signal without touching status.
#[tokio::test]
async fn pricing_change_preserves_priors_and_canary_status() {
    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(FileStorage::open(dir.path()).await);

    let mut existing = model_entry("openai/gpt-4o", 0.0025, 0.01, 0.8);
    existing.identity.status = ModelStatus::Active;
    existing.evaluation_meta.canary_status = CanaryStatus::Passed;
    existing.prior_for_mut("code", "medium").quality_prior = 0.88;
    storage.upsert_model(existing).await;

    let catalog = ProviderCatalogEntry {
        provider: "openai".to_string(),
        model_id: "gpt-4o".to_string(),
        pricing: model_pricing(0.003, 0.01),
        capabilities: Vec::new(),
        aliases: Vec::new(),
    };
    let (diff, updated) = process_provider_model(&storage, catalog).await;

    assert_eq!(diff, RecruitingDiff::PricingChanged);
    let updated = updated.unwrap();
    assert_eq!(updated.pricing.in_per_1k, 0.003);
    assert_eq!(updated.identity.status, ModelStatus::Active);
    assert_eq!(updated.evaluation_meta.canary_status, CanaryStatus::Passed);
    assert_eq!(updated.prior_for("code", "medium").unwrap().quality_prior, 0.88);

    let signals = storage.list_signals(Some("openai/gpt-4o"), 365).await;
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].reason, "pricing_changed");
}

/// Scenario 3: among viable candidates clustered near the top score, routing
/// prefers the cheapest one rather than the highest-scoring one.
#[tokio::test]
async fn routing_prefers_cheapest_among_near_equal_scores() {
    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(FileStorage::open(dir.path()).await);
    storage.upsert_model(model_entry("openai/cheap", 0.0002, 0.0006, 0.75)).await;
    storage.upsert_model(model_entry("openai/medium", 0.002, 0.006, 0.78)).await;
    storage.upsert_model(model_entry("openai/expensive", 0.02, 0.06, 0.79)).await;

    let router = Router::new(storage);
    let decision = router
        .route(&package("code", TierProfile::Standard), 1.0, None, &RoutingOptions::default())
        .await
        .unwrap();

    assert_eq!(decision.model_id, "openai/cheap");
    assert_eq!(decision.candidates_considered, 3);
}

/// Scenario 4: a canary regression (pass rate below the probation
/// threshold) recommends demoting an active model to probation.
#[tokio::test]
async fn canary_regression_forces_probation() {
    let outcome = evaluate_suite_for_status_change(ModelStatus::Active, 1, 0.5, 2, 0.82, 0.70);
    assert_eq!(outcome.status, CanaryStatus::Failed);
    assert_eq!(outcome.recommended_action, Some(HrActionKind::Probation));
    assert_eq!(outcome.reason, "canary_regression");
}

/// Scenario 5: a portfolio slot pointing at a model no longer in the
/// registry fails coverage validation with the missing id reported.
#[tokio::test]
async fn portfolio_coverage_flags_a_missing_slot_model() {
    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(FileStorage::open(dir.path()).await);
    storage.upsert_model(model_entry("openai/gpt-4o-mini", 0.0002, 0.0006, 0.7)).await;

    let recommendation = PortfolioRecommendation {
        worker_cheap: Some("openai/gpt-4o-mini".to_string()),
        worker_implementation: Some("openai/gpt-5".to_string()),
        worker_strategy: None,
        qa_primary: None,
        qa_backup: None,
    };
    let known: HashSet<String> = storage
        .list_models(&Default::default())
        .await
        .into_iter()
        .map(|m| m.id)
        .collect();

    let missing = validate_portfolio_coverage(&recommendation, &known).unwrap_err();
    assert_eq!(missing, vec!["openai/gpt-5".to_string()]);
}

/// Scenario 6: an aggregation report missing a required source file is
/// rejected with a defect naming the missing path.
#[tokio::test]
async fn aggregation_report_missing_required_file_is_rejected() {
    let required_but_cli = [
        "package.json",
        "tsconfig.json",
        "src/parser.ts",
        "src/stats.ts",
        "src/index.ts",
        "README.md",
    ];
    let report = AggregationReport {
        run_session_id: "run-1".to_string(),
        package_id: "p1".to_string(),
        files: required_but_cli
            .iter()
            .map(|path| FileEntry {
                path: path.to_string(),
                content: format!("content for {path}"),
            })
            .collect(),
        notes: None,
    };
    let known: HashSet<String> = ["p1".to_string()].into_iter().collect();

    let err = validate_aggregation_report(&report, &known).unwrap_err();
    assert!(err.to_string().contains("src/cli.ts"));
}
