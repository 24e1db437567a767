//! HTTP surface: axum router, shared `AppState`, and one handler per row of
//! the external-interfaces table. Every success response is wrapped in
//! `{success: true, ...}`; failures flow through `AppError`'s `IntoResponse`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router as AxumRouter};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::analytics::{aggregate_kpis, can_auto_apply, generate_proposals};
use crate::assembler::{assemble, materialize, validate_aggregation_report, AggregationReport, MaterializeOptions};
use crate::collaborators::{DirectiveDecomposer, LlmExecutor, MockLlmExecutor};
use crate::config::Config;
use crate::domain::{
    DecisionType, ModelRegistryEntry, ModelStatus, PackageState, PortfolioMode, PortfolioRecommendation,
    RunStatus, TierProfile, TuningConfig,
};
use crate::error::{AppError, AppResult};
use crate::ledger::LedgerStore;
use crate::planning::{package_project, plan_project, LineDirectiveDecomposer};
use crate::registry::{registry_health, DbStorage, EvaluationService, FileStorage, HrActionQueue, ModelFilters, Storage};
use crate::router::{validate_portfolio_coverage, PortfolioCache, Router};
use crate::runner::{PackageExecutor, PackageOutcome, RunCoordinator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionStatus {
    Running,
    Completed,
}

#[derive(Debug, Clone)]
struct SessionProgress {
    status: SessionStatus,
    total_packages: usize,
    completed_packages: usize,
    running_packages: usize,
    warnings: Vec<String>,
    outcomes: Option<Vec<PackageOutcome>>,
}

pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub ledger_store: Arc<LedgerStore>,
    pub portfolio_cache: Arc<PortfolioCache>,
    pub hr_actions: Arc<HrActionQueue>,
    pub router: Arc<Router>,
    pub run_coordinator: Arc<RunCoordinator>,
    pub decomposer: Arc<dyn DirectiveDecomposer>,
    pub tuning_config: Mutex<TuningConfig>,
    pub portfolio_mode: Mutex<PortfolioMode>,
    sessions: Mutex<HashMap<String, SessionProgress>>,
}

impl AppState {
    pub async fn from_config(config: &Config, executor: Arc<dyn LlmExecutor>) -> anyhow::Result<Self> {
        let storage: Arc<dyn Storage> = match config.persistence_driver {
            crate::config::PersistenceDriver::File => {
                Arc::new(FileStorage::open(&config.model_hr_data_dir).await)
            }
            crate::config::PersistenceDriver::Db => {
                Arc::new(DbStorage::open(&config.model_hr_db_path).await?)
            }
        };

        let ledger_store = Arc::new(LedgerStore::new(config.ledger_max_decisions, config.ledger_max_runs));
        let portfolio_cache = Arc::new(PortfolioCache::new(storage.clone(), config.portfolio_cache_ttl));
        let hr_actions = Arc::new(HrActionQueue::new(storage.clone(), config.actions_retention_days));
        let router = Arc::new(Router::new(storage.clone()));
        let evaluation = Arc::new(EvaluationService::new(storage.clone(), config.observations_cap));
        let executor_handle = PackageExecutor::new(router.clone(), executor, ledger_store.clone(), evaluation);
        let run_coordinator = Arc::new(RunCoordinator::new(
            Arc::new(executor_handle),
            ledger_store.clone(),
            config.worker_concurrency,
            config.qa_concurrency,
        ));

        Ok(Self {
            storage,
            ledger_store,
            portfolio_cache,
            hr_actions,
            router,
            run_coordinator,
            decomposer: Arc::new(LineDirectiveDecomposer),
            tuning_config: Mutex::new(TuningConfig::default()),
            portfolio_mode: Mutex::new(PortfolioMode::Off),
            sessions: Mutex::new(HashMap::new()),
        })
    }

    /// Convenience constructor for tests: in-memory file storage under a
    /// temp dir and a `MockLlmExecutor`.
    pub async fn for_tests(data_dir: &std::path::Path) -> Arc<Self> {
        let storage: Arc<dyn Storage> = Arc::new(FileStorage::open(data_dir).await);
        let ledger_store = Arc::new(LedgerStore::new(200, 200));
        let portfolio_cache = Arc::new(PortfolioCache::new(storage.clone(), Duration::from_secs(60)));
        let hr_actions = Arc::new(HrActionQueue::new(storage.clone(), 14));
        let router = Arc::new(Router::new(storage.clone()));
        let executor: Arc<dyn LlmExecutor> = Arc::new(MockLlmExecutor::new("ok"));
        let evaluation = Arc::new(EvaluationService::new(storage.clone(), 500));
        let executor_handle = PackageExecutor::new(router.clone(), executor, ledger_store.clone(), evaluation);
        let run_coordinator = Arc::new(RunCoordinator::new(Arc::new(executor_handle), ledger_store.clone(), 3, 2));

        Arc::new(Self {
            storage,
            ledger_store,
            portfolio_cache,
            hr_actions,
            router,
            run_coordinator,
            decomposer: Arc::new(LineDirectiveDecomposer),
            tuning_config: Mutex::new(TuningConfig::default()),
            portfolio_mode: Mutex::new(PortfolioMode::Off),
            sessions: Mutex::new(HashMap::new()),
        })
    }
}

pub fn build_router(state: Arc<AppState>) -> AxumRouter {
    AxumRouter::new()
        .route("/projects/plan", post(plan_handler))
        .route("/projects/package", post(package_handler))
        .route("/projects/run-packages", post(run_packages_handler))
        .route("/projects/run-session", get(run_session_handler))
        .route("/projects/ledger", get(ledger_handler))
        .route("/projects/run-bundle", get(run_bundle_handler))
        .route("/assembler/assemble", post(assemble_handler))
        .route("/assembler/materialize", post(materialize_handler))
        .route("/observability/kpis", get(kpis_handler))
        .route(
            "/observability/tuning/config",
            get(tuning_config_get).post(tuning_config_post),
        )
        .route("/observability/tuning/proposals", get(tuning_proposals_handler))
        .route("/observability/tuning/apply", post(tuning_apply_handler))
        .route("/ops/model-hr/registry", get(registry_list_handler).post(registry_upsert_handler))
        .route("/ops/model-hr/registry/:id/status", post(registry_set_status_handler))
        .route("/ops/model-hr/registry/:id/disable", post(registry_disable_handler))
        .route("/ops/model-hr/actions", get(actions_list_handler))
        .route("/ops/model-hr/actions/:id/approve", post(actions_approve_handler))
        .route("/ops/model-hr/actions/:id/reject", post(actions_reject_handler))
        .route("/ops/model-hr/health", get(registry_health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn ok(value: Value) -> Json<Value> {
    let mut body = json!({ "success": true });
    if let Value::Object(map) = value {
        body.as_object_mut().unwrap().extend(map);
    }
    Json(body)
}

// ---------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PlanRequest {
    directive: String,
    project_budget_usd: f64,
    #[serde(default)]
    tier_profile: Option<TierProfile>,
}

async fn plan_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlanRequest>,
) -> AppResult<Json<Value>> {
    if req.directive.trim().is_empty() {
        return Err(AppError::validation("directive must not be empty"));
    }
    let tier = req.tier_profile.unwrap_or(TierProfile::Standard);
    let plan = plan_project(state.decomposer.as_ref(), &req.directive, req.project_budget_usd, tier);
    Ok(ok(json!({
        "plan": plan.subtasks,
        "underfunded": plan.underfunded,
        "budgetWarnings": plan.budget_warnings,
    })))
}

#[derive(Debug, Deserialize)]
struct PackageRequest {
    plan: Vec<crate::collaborators::ProjectSubtask>,
}

async fn package_handler(Json(req): Json<PackageRequest>) -> AppResult<Json<Value>> {
    let packages = package_project(&req.plan);
    Ok(ok(json!({ "packages": packages })))
}

#[derive(Debug, Deserialize)]
struct RunPackagesRequest {
    packages: Vec<crate::domain::AtomicWorkPackage>,
    project_budget_usd: f64,
    #[serde(default)]
    tier_profile: Option<TierProfile>,
}

#[derive(Debug, Deserialize)]
struct RunPackagesQuery {
    #[serde(default, rename = "async")]
    r#async: Option<bool>,
}

async fn run_packages_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RunPackagesQuery>,
    Json(req): Json<RunPackagesRequest>,
) -> AppResult<Json<Value>> {
    if req.packages.is_empty() {
        return Err(AppError::validation("packages must not be empty"));
    }
    let run_session_id = Uuid::new_v4().to_string();
    state.ledger_store.create_ledger(run_session_id.clone()).await;
    state.ledger_store.update_counts(&run_session_id, |c| {
        c.total_packages = req.packages.len() as u64;
    }).await;

    {
        let mut sessions = state.sessions.lock().await;
        sessions.insert(
            run_session_id.clone(),
            SessionProgress {
                status: SessionStatus::Running,
                total_packages: req.packages.len(),
                completed_packages: 0,
                running_packages: req.packages.len(),
                warnings: Vec::new(),
                outcomes: None,
            },
        );
    }

    let package_budget = req.project_budget_usd / req.packages.len().max(1) as f64;
    let run_state = state.clone();
    let sid = run_session_id.clone();
    let packages = req.packages.clone();

    // Slot ids that no longer resolve in the registry downgrade this run to
    // no-portfolio routing; the run proceeds on the general candidate set.
    let mode = *state.portfolio_mode.lock().await;
    let mut portfolio = PortfolioRecommendation::default();
    if mode != PortfolioMode::Off {
        portfolio = state.portfolio_cache.get(mode).await;
        let known_ids: std::collections::HashSet<String> = state
            .storage
            .list_models(&Default::default())
            .await
            .into_iter()
            .map(|m| m.id)
            .collect();
        if let Err(missing) = validate_portfolio_coverage(&portfolio, &known_ids) {
            state
                .ledger_store
                .record_decision(
                    &run_session_id,
                    DecisionType::BudgetOptimization,
                    None,
                    json!({
                        "portfolio_validation_failed": true,
                        "reason": "portfolio_coverage_invalid",
                        "missing_model_ids": missing,
                    }),
                )
                .await;
            portfolio = PortfolioRecommendation::default();
        }
    }

    let run_future = async move {
        let result = run_state
            .run_coordinator
            .run(
                &sid,
                &packages,
                req.project_budget_usd,
                package_budget,
                None,
                mode,
                &portfolio,
            )
            .await;

        let outcomes = result.unwrap_or_default();
        let completed = outcomes.iter().filter(|o| o.state == PackageState::Completed).count();
        let failed = outcomes.iter().filter(|o| o.state == PackageState::Failed).count();
        let skipped = outcomes.iter().filter(|o| o.state == PackageState::Skipped).count();

        run_state.ledger_store.update_counts(&sid, |c| {
            c.completed_packages = completed as u64;
            c.failed_packages = failed as u64;
            c.skipped_packages = skipped as u64;
        }).await;
        run_state.ledger_store.finalize_ledger(&sid, RunStatus::Completed).await;

        let mut sessions = run_state.sessions.lock().await;
        sessions.insert(
            sid.clone(),
            SessionProgress {
                status: SessionStatus::Completed,
                total_packages: outcomes.len(),
                completed_packages: completed,
                running_packages: 0,
                warnings: Vec::new(),
                outcomes: Some(outcomes),
            },
        );
    };

    if query.r#async.unwrap_or(true) {
        tokio::spawn(run_future);
        Ok(ok(json!({ "runSessionId": run_session_id })))
    } else {
        run_future.await;
        let sessions = state.sessions.lock().await;
        let session = sessions.get(&run_session_id);
        Ok(ok(json!({
            "runSessionId": run_session_id,
            "result": session.and_then(|s| s.outcomes.clone()),
        })))
    }
}

#[derive(Debug, Deserialize)]
struct IdQuery {
    id: String,
}

async fn run_session_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<Value>> {
    let sessions = state.sessions.lock().await;
    let session = sessions
        .get(&query.id)
        .ok_or_else(|| AppError::not_found("run_session", &query.id))?;

    Ok(ok(json!({
        "session": {
            "status": match session.status {
                SessionStatus::Running => "running",
                SessionStatus::Completed => "completed",
            },
            "progress": {
                "totalPackages": session.total_packages,
                "completedPackages": session.completed_packages,
                "runningPackages": session.running_packages,
                "warnings": session.warnings,
                "partialResult": session.outcomes,
            }
        }
    })))
}

async fn ledger_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<Value>> {
    let ledger = state
        .ledger_store
        .get_ledger(&query.id)
        .await
        .ok_or_else(|| AppError::not_found("ledger", &query.id))?;
    Ok(ok(json!({ "ledger": ledger })))
}

#[derive(Debug, Deserialize)]
struct RunBundleQuery {
    id: String,
    #[serde(default = "default_true")]
    trust: bool,
    #[serde(default = "default_true")]
    variance: bool,
}

fn default_true() -> bool {
    true
}

async fn run_bundle_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RunBundleQuery>,
) -> AppResult<Json<Value>> {
    let ledger = state
        .ledger_store
        .get_ledger(&query.id)
        .await
        .ok_or_else(|| AppError::not_found("ledger", &query.id))?;
    let summary = crate::analytics::summarize_ledger(&ledger);

    let mut body = json!({ "ledger": ledger, "summary": summary });
    if query.trust {
        body["trust"] = json!(ledger.trust_deltas);
    }
    if query.variance {
        body["variance"] = json!(ledger.variance);
    }
    Ok(ok(body))
}

// ---------------------------------------------------------------------
// Assembler
// ---------------------------------------------------------------------

async fn assemble_handler(
    State(state): State<Arc<AppState>>,
    Json(report): Json<AggregationReport>,
) -> AppResult<Json<Value>> {
    let known: std::collections::HashSet<String> = [report.package_id.clone()].into_iter().collect();
    validate_aggregation_report(&report, &known)?;

    let run_dir = std::env::temp_dir().join("model_agency_core_runs").join(&report.run_session_id);
    let _ = &state;
    let result = assemble(&run_dir, &report)
        .await
        .map_err(AppError::Internal)?;
    Ok(ok(json!({ "assembly": result })))
}

#[derive(Debug, Deserialize)]
struct MaterializeRequest {
    run_session_id: String,
    run_dir: String,
    deliverables_root: String,
}

async fn materialize_handler(Json(req): Json<MaterializeRequest>) -> AppResult<Json<Value>> {
    let result = materialize(
        std::path::Path::new(&req.run_dir),
        std::path::Path::new(&req.deliverables_root),
        &req.run_session_id,
        MaterializeOptions { git_commit: false },
    )
    .await
    .map_err(AppError::Internal)?;

    Ok(ok(json!({
        "deliverableDir": result.deliverable_dir,
        "zipPath": result.zip_path,
        "gitCommitted": result.git_committed,
    })))
}

// ---------------------------------------------------------------------
// Observability / tuning
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct WindowQuery {
    #[serde(default = "default_window")]
    window: usize,
}

fn default_window() -> usize {
    50
}

async fn kpis_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WindowQuery>,
) -> AppResult<Json<Value>> {
    let window = query.window.clamp(1, 200);
    let mut ledgers = state.ledger_store.list_ledgers().await;
    ledgers.truncate(window);
    let kpis = aggregate_kpis(&ledgers);
    Ok(ok(json!({ "kpis": kpis, "runs": ledgers })))
}

#[derive(Debug, Deserialize)]
struct TuningConfigRequest {
    #[serde(default)]
    enabled: Option<bool>,
    #[serde(default)]
    allow_auto_apply: Option<bool>,
}

async fn tuning_config_get(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = state.tuning_config.lock().await;
    ok(json!({ "enabled": config.enabled, "allowAutoApply": config.allow_auto_apply }))
}

async fn tuning_config_post(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TuningConfigRequest>,
) -> Json<Value> {
    let mut config = state.tuning_config.lock().await;
    if let Some(enabled) = req.enabled {
        config.enabled = enabled;
    }
    if let Some(allow) = req.allow_auto_apply {
        config.allow_auto_apply = allow;
    }
    ok(json!({ "enabled": config.enabled, "allowAutoApply": config.allow_auto_apply }))
}

async fn tuning_proposals_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WindowQuery>,
) -> AppResult<Json<Value>> {
    let window = query.window.clamp(1, 200);
    let mut ledgers = state.ledger_store.list_ledgers().await;
    ledgers.truncate(window);
    let kpis = aggregate_kpis(&ledgers);
    let mode = *state.portfolio_mode.lock().await;
    let proposals = generate_proposals(&kpis, mode);
    Ok(ok(json!({ "proposals": proposals })))
}

#[derive(Debug, Deserialize)]
struct TuningApplyRequest {
    proposal_id: String,
}

async fn tuning_apply_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TuningApplyRequest>,
) -> AppResult<Json<Value>> {
    let mut ledgers = state.ledger_store.list_ledgers().await;
    ledgers.truncate(50);
    let kpis = aggregate_kpis(&ledgers);
    let mode = *state.portfolio_mode.lock().await;
    let proposals = generate_proposals(&kpis, mode);

    let proposal = proposals
        .into_iter()
        .find(|p| p.id == req.proposal_id)
        .ok_or_else(|| AppError::not_found("tuning_proposal", &req.proposal_id))?;

    let config = state.tuning_config.lock().await.clone();
    can_auto_apply(&config, &proposal)?;

    match proposal.action {
        crate::domain::TuningAction::SetPortfolioMode => {
            *state.portfolio_mode.lock().await = PortfolioMode::Prefer;
        }
        crate::domain::TuningAction::RefreshPortfolio => {
            state.portfolio_cache.invalidate().await;
        }
        crate::domain::TuningAction::LowerMinPredictedQuality => {}
    }

    Ok(ok(json!({ "applied": true, "proposal": proposal })))
}

// ---------------------------------------------------------------------
// Model HR
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RegistryListQuery {
    #[serde(default)]
    include_disabled: Option<bool>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    provider: Option<String>,
}

async fn registry_list_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RegistryListQuery>,
) -> Json<Value> {
    let status = query.status.and_then(|s| match s.as_str() {
        "active" => Some(vec![ModelStatus::Active]),
        "probation" => Some(vec![ModelStatus::Probation]),
        "deprecated" => Some(vec![ModelStatus::Deprecated]),
        "disabled" => Some(vec![ModelStatus::Disabled]),
        _ => None,
    });
    let filters = ModelFilters {
        status,
        provider: query.provider,
        tiers: None,
        task_type: None,
        include_disabled: query.include_disabled.unwrap_or(false),
    };
    let models = state.storage.list_models(&filters).await;
    ok(json!({ "models": models }))
}

async fn registry_upsert_handler(
    State(state): State<Arc<AppState>>,
    Json(entry): Json<ModelRegistryEntry>,
) -> Json<Value> {
    let stored = state.storage.upsert_model(entry).await;
    ok(json!({ "model": stored }))
}

#[derive(Debug, Deserialize)]
struct SetStatusRequest {
    status: String,
}

async fn registry_set_status_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SetStatusRequest>,
) -> AppResult<Json<Value>> {
    let status = match req.status.as_str() {
        "active" => ModelStatus::Active,
        "probation" => ModelStatus::Probation,
        other => return Err(AppError::validation(format!("invalid status {other:?}"))),
    };
    let updated = state
        .storage
        .set_model_status(&id, status)
        .await
        .ok_or_else(|| AppError::not_found("model", &id))?;
    Ok(ok(json!({ "model": updated })))
}

#[derive(Debug, Deserialize)]
struct DisableRequest {
    reason: String,
}

async fn registry_disable_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<DisableRequest>,
) -> AppResult<Json<Value>> {
    let updated = state
        .storage
        .disable_model(&id, &req.reason)
        .await
        .ok_or_else(|| AppError::not_found("model", &id))?;
    Ok(ok(json!({ "model": updated })))
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    100
}

async fn actions_list_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Json<Value> {
    let limit = query.limit.min(500);
    let actions = state.hr_actions.list(limit).await;
    ok(json!({ "actions": actions }))
}

#[derive(Debug, Deserialize)]
struct ApproveRequest {
    approved_by: String,
}

async fn actions_approve_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ApproveRequest>,
) -> AppResult<Json<Value>> {
    let action = state.hr_actions.approve(&id, &req.approved_by).await?;
    Ok(ok(json!({ "action": action })))
}

#[derive(Debug, Deserialize)]
struct RejectRequest {
    rejected_by: String,
    #[serde(default)]
    reason: Option<String>,
}

async fn actions_reject_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<RejectRequest>,
) -> AppResult<Json<Value>> {
    let action = state
        .hr_actions
        .reject(&id, &req.rejected_by, req.reason.as_deref().unwrap_or("unspecified"))
        .await?;
    Ok(ok(json!({ "action": action })))
}

async fn registry_health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let live_count = state.storage.list_models(&Default::default()).await.len();
    let health = registry_health(state.storage.as_ref(), live_count).await;
    ok(json!({ "registryHealth": health }))
}
