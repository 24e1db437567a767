//! The work-package runner: DAG scheduling, per-package execution with
//! escalation, and run-budget backpressure.

pub mod backpressure;
pub mod execution;
pub mod scheduler;

pub use backpressure::{posture_for, BudgetPosture};
pub use execution::{PackageExecutor, PackageOutcome};
pub use scheduler::{schedule_waves, ScheduleError};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;

use crate::domain::{
    AtomicWorkPackage, PackageRole, PackageState, PortfolioMode, PortfolioRecommendation,
    TenantProcurementConfig,
};
use crate::ledger::LedgerStore;
use crate::router::RoutingOptions;

/// Runs every wave of `packages` to completion (or failure) against a single
/// run budget, applying backpressure between waves. Packages within a wave
/// run concurrently, bounded by separate worker/QA concurrency pools.
pub struct RunCoordinator {
    executor: Arc<PackageExecutor>,
    ledger: Arc<LedgerStore>,
    worker_semaphore: Arc<Semaphore>,
    qa_semaphore: Arc<Semaphore>,
}

impl RunCoordinator {
    pub fn new(
        executor: Arc<PackageExecutor>,
        ledger: Arc<LedgerStore>,
        worker_concurrency: usize,
        qa_concurrency: usize,
    ) -> Self {
        Self {
            executor,
            ledger,
            worker_semaphore: Arc::new(Semaphore::new(worker_concurrency.max(1))),
            qa_semaphore: Arc::new(Semaphore::new(qa_concurrency.max(1))),
        }
    }

    pub async fn run(
        &self,
        run_session_id: &str,
        packages: &[AtomicWorkPackage],
        run_budget_usd: f64,
        package_budget_usd: f64,
        tenant_config: Option<&TenantProcurementConfig>,
        portfolio_mode: PortfolioMode,
        portfolio: &PortfolioRecommendation,
    ) -> Result<Vec<PackageOutcome>, ScheduleError> {
        let waves = schedule_waves(packages)?;
        let by_id: HashMap<&str, &AtomicWorkPackage> =
            packages.iter().map(|p| (p.id.as_str(), p)).collect();
        let known_package_ids: HashSet<String> = packages.iter().map(|p| p.id.clone()).collect();

        let mut outcomes = Vec::new();
        let mut state_by_id: HashMap<String, PackageState> = HashMap::new();

        'outer: for wave in waves {
            let spent = {
                let ledger = self.ledger.get_ledger(run_session_id).await;
                ledger.map(|l| l.costs.total_usd()).unwrap_or(0.0)
            };
            let posture = posture_for(spent, run_budget_usd);

            if posture == BudgetPosture::HaltPending {
                for id in wave {
                    state_by_id.insert(id.clone(), PackageState::Skipped);
                    outcomes.push(PackageOutcome {
                        package_id: id,
                        state: PackageState::Skipped,
                        model_id: None,
                        output: None,
                        escalations: 0,
                        quality_score: None,
                        skip_reason: Some("run_budget_exhausted".to_string()),
                    });
                }
                continue 'outer;
            }

            let effective_budget = if posture == BudgetPosture::DowngradeToCheapest {
                package_budget_usd.min(crate::domain::TierProfile::Cheap.threshold_usd())
            } else {
                package_budget_usd
            };

            let mut pending_ids = Vec::new();
            let mut tasks = Vec::new();

            for id in wave {
                let Some(&package) = by_id.get(id.as_str()) else {
                    continue;
                };

                let blocked = package
                    .dependencies
                    .iter()
                    .any(|dep| state_by_id.get(dep) != Some(&PackageState::Completed));
                if blocked {
                    state_by_id.insert(id.clone(), PackageState::Skipped);
                    outcomes.push(PackageOutcome {
                        package_id: id,
                        state: PackageState::Skipped,
                        model_id: None,
                        output: None,
                        escalations: 0,
                        quality_score: None,
                        skip_reason: Some("upstream_failed".to_string()),
                    });
                    continue;
                }

                let slot_ids: Vec<String> = portfolio
                    .slot_ids_for_role(package.role)
                    .into_iter()
                    .map(|s| s.to_string())
                    .collect();

                let executor = self.executor.clone();
                let semaphore = match package.role {
                    PackageRole::Worker => self.worker_semaphore.clone(),
                    PackageRole::Qa => self.qa_semaphore.clone(),
                };
                let run_session_id = run_session_id.to_string();
                let package = package.clone();
                let tenant_config = tenant_config.cloned();
                let known_package_ids = known_package_ids.clone();

                pending_ids.push(id);
                tasks.push(tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                    let routing = RoutingOptions {
                        portfolio_mode,
                        portfolio_slot_ids: &slot_ids,
                        ..RoutingOptions::default()
                    };
                    executor
                        .execute(
                            &run_session_id,
                            &package,
                            effective_budget,
                            tenant_config.as_ref(),
                            &routing,
                            &known_package_ids,
                        )
                        .await
                }));
            }

            for (id, task) in pending_ids.into_iter().zip(join_all(tasks).await) {
                let outcome = match task {
                    Ok(outcome) => outcome,
                    Err(_join_err) => PackageOutcome {
                        package_id: id.clone(),
                        state: PackageState::Failed,
                        model_id: None,
                        output: None,
                        escalations: 0,
                        quality_score: None,
                        skip_reason: None,
                    },
                };
                state_by_id.insert(id, outcome.state);
                outcomes.push(outcome);
            }
        }

        Ok(outcomes)
    }
}
