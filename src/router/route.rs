//! Cheapest-viable model routing.
//!
//! Candidates are every registry entry passing eligibility, ranked either by
//! explainable score (ties broken on cost) or, under `cheapest_viable_chosen`,
//! by cost directly among every candidate that cleared eligibility and
//! budget — the behaviour this module generalises from
//! `MultiModelRouter::select_cost_optimized` and `select_capability_based` in
//! the router example it is grounded on. Portfolio `lock`/`prefer` modes and
//! the budget-fail policy are applied before ranking.

use std::sync::Arc;

use thiserror::Error;

use crate::domain::{
    AtomicWorkPackage, ModelRegistryEntry, PortfolioMode, TenantProcurementConfig, TierProfile,
};
use crate::registry::{is_eligible, compute_model_score, EligibilityContext, ScoreBreakdown, Storage};
use crate::router::tokens::{estimate_cost_usd, estimate_tokens_for_task};

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("no eligible models for task_type={task_type} tier={tier:?}")]
    NoEligibleModels { task_type: String, tier: TierProfile },

    #[error("all eligible candidates exceeded package budget of {budget_usd} USD")]
    BudgetExceeded { budget_usd: f64 },
}

#[derive(Debug, Clone)]
pub struct RouteDecision {
    pub model_id: String,
    pub predicted_cost_usd: f64,
    pub score: ScoreBreakdown,
    pub candidates_considered: usize,
    pub ineligible_reasons: Vec<String>,
    /// True when a `lock`'d portfolio slot had no viable candidate and
    /// routing fell back to the general candidate set.
    pub portfolio_bypassed: bool,
    pub bypass_reason: Option<String>,
}

/// Fraction of the top score a cheaper candidate is allowed to trail by and
/// still be preferred (cheapest-viable, not simply highest-scoring). Applies
/// only when `RoutingOptions::cheapest_viable_chosen` is false.
const SCORE_TOLERANCE: f64 = 0.05;

/// Score boost applied to a `prefer`-mode portfolio slot before ranking.
const PREFER_BOOST: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnBudgetFail {
    /// Falls back to the cheapest eligible candidate even if it exceeds the
    /// package budget, rather than failing the route.
    BestEffortWithinBudget,
    Fail,
}

impl Default for OnBudgetFail {
    fn default() -> Self {
        OnBudgetFail::Fail
    }
}

/// Portfolio and ranking-mode knobs for a single `route` call.
#[derive(Debug, Clone, Default)]
pub struct RoutingOptions<'a> {
    pub portfolio_mode: PortfolioMode,
    /// Slot model ids applicable to this package's role/tier, when portfolio
    /// mode is `Prefer` or `Lock`.
    pub portfolio_slot_ids: &'a [String],
    pub cheapest_viable_chosen: bool,
    pub on_budget_fail: OnBudgetFail,
}

pub struct Router {
    storage: Arc<dyn Storage>,
}

struct Candidate {
    entry: ModelRegistryEntry,
    cost: f64,
    score: ScoreBreakdown,
    ranked_score: f64,
}

impl Router {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn route(
        &self,
        package: &AtomicWorkPackage,
        package_budget_usd: f64,
        tenant_config: Option<&TenantProcurementConfig>,
        routing: &RoutingOptions<'_>,
    ) -> Result<RouteDecision, RouteError> {
        let tier = package.tier_profile_override.unwrap_or(TierProfile::Standard);

        let all_models = self.storage.list_models(&Default::default()).await;
        let ctx = EligibilityContext {
            task_type: &package.task_type,
            tier,
            package_budget_usd,
            importance: 0.5,
            tenant_config,
            use_case_tags: &package.use_case_tags,
        };

        let mut ineligible_reasons = Vec::new();
        let mut candidates: Vec<Candidate> = Vec::new();

        for entry in all_models {
            let verdict = is_eligible(&entry, &ctx);
            if !verdict.is_eligible() {
                if let crate::registry::EligibilityVerdict::Ineligible { reason } = verdict {
                    ineligible_reasons.push(format!("{}: {reason}", entry.id));
                }
                continue;
            }
            let cost = estimate_cost_usd(
                &entry.pricing,
                package.estimated_tokens.input,
                package.estimated_tokens.output,
            );
            let score = compute_model_score(&entry, &package.task_type, &package.difficulty, tier, cost);
            let ranked_score = if routing.portfolio_mode == PortfolioMode::Prefer
                && routing.portfolio_slot_ids.iter().any(|id| id == &entry.id)
            {
                (score.total + PREFER_BOOST).min(1.0)
            } else {
                score.total
            };
            candidates.push(Candidate { entry, cost, score, ranked_score });
        }

        if candidates.is_empty() {
            return Err(RouteError::NoEligibleModels {
                task_type: package.task_type.clone(),
                tier,
            });
        }

        let candidates_considered = candidates.len();

        let (pool, portfolio_bypassed, bypass_reason) =
            self.apply_portfolio_lock(candidates, package_budget_usd, routing);

        if pool.is_empty() {
            return Err(RouteError::NoEligibleModels {
                task_type: package.task_type.clone(),
                tier,
            });
        }

        let within_budget: Vec<Candidate> = pool
            .into_iter()
            .filter(|c| c.cost <= package_budget_usd)
            .collect();

        let winner = if !within_budget.is_empty() {
            Self::rank(within_budget, routing)
        } else {
            match routing.on_budget_fail {
                OnBudgetFail::BestEffortWithinBudget => {
                    let mut all = self.all_candidates_again(package, &ctx).await;
                    all.sort_by(|a, b| a.cost.partial_cmp(&b.cost).unwrap());
                    match all.into_iter().next() {
                        Some(c) => c,
                        None => {
                            return Err(RouteError::BudgetExceeded {
                                budget_usd: package_budget_usd,
                            })
                        }
                    }
                }
                OnBudgetFail::Fail => {
                    return Err(RouteError::BudgetExceeded {
                        budget_usd: package_budget_usd,
                    })
                }
            }
        };

        Ok(RouteDecision {
            model_id: winner.entry.id,
            predicted_cost_usd: winner.cost,
            score: winner.score,
            candidates_considered,
            ineligible_reasons,
            portfolio_bypassed,
            bypass_reason,
        })
    }

    /// Restricts `candidates` to the `lock`'d slot ids when in `Lock` mode.
    /// Falls back to the full candidate set with a bypass reason when no
    /// slot candidate clears eligibility (already true, since `candidates`
    /// is pre-filtered) or budget.
    fn apply_portfolio_lock(
        &self,
        candidates: Vec<Candidate>,
        package_budget_usd: f64,
        routing: &RoutingOptions<'_>,
    ) -> (Vec<Candidate>, bool, Option<String>) {
        if routing.portfolio_mode != PortfolioMode::Lock || routing.portfolio_slot_ids.is_empty() {
            return (candidates, false, None);
        }

        let (locked, rest): (Vec<Candidate>, Vec<Candidate>) = candidates
            .into_iter()
            .partition(|c| routing.portfolio_slot_ids.iter().any(|id| id == &c.entry.id));

        if locked.is_empty() {
            return (rest, true, Some("allowed_models_ineligible".to_string()));
        }

        let locked_within_budget = locked.iter().any(|c| c.cost <= package_budget_usd);
        if locked_within_budget {
            (locked, false, None)
        } else {
            let mut fallback = locked;
            fallback.extend(rest);
            (fallback, true, Some("allowed_models_over_budget".to_string()))
        }
    }

    /// Re-scores the full eligible set for the best-effort budget fallback.
    async fn all_candidates_again(
        &self,
        package: &AtomicWorkPackage,
        ctx: &EligibilityContext<'_>,
    ) -> Vec<Candidate> {
        let tier = package.tier_profile_override.unwrap_or(TierProfile::Standard);
        let all_models = self.storage.list_models(&Default::default()).await;
        all_models
            .into_iter()
            .filter(|entry| is_eligible(entry, ctx).is_eligible())
            .map(|entry| {
                let cost = estimate_cost_usd(
                    &entry.pricing,
                    package.estimated_tokens.input,
                    package.estimated_tokens.output,
                );
                let score = compute_model_score(&entry, &package.task_type, &package.difficulty, tier, cost);
                Candidate { ranked_score: score.total, entry, cost, score }
            })
            .collect()
    }

    fn rank(mut within_budget: Vec<Candidate>, routing: &RoutingOptions<'_>) -> Candidate {
        if routing.cheapest_viable_chosen {
            within_budget.sort_by(|a, b| {
                a.cost
                    .partial_cmp(&b.cost)
                    .unwrap()
                    .then_with(|| b.ranked_score.partial_cmp(&a.ranked_score).unwrap())
            });
            within_budget.remove(0)
        } else {
            let top_score = within_budget
                .iter()
                .map(|c| c.ranked_score)
                .fold(f64::MIN, f64::max);
            let mut viable: Vec<Candidate> = within_budget
                .into_iter()
                .filter(|c| c.ranked_score >= top_score - SCORE_TOLERANCE)
                .collect();
            viable.sort_by(|a, b| a.cost.partial_cmp(&b.cost).unwrap());
            viable.remove(0)
        }
    }
}
