//! Model HR registry entities.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    Active,
    Probation,
    Deprecated,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierProfile {
    Cheap,
    Standard,
    Premium,
}

impl TierProfile {
    /// Per-package expected-cost threshold in USD used by the score's cost penalty.
    pub fn threshold_usd(self) -> f64 {
        match self {
            TierProfile::Cheap => 0.0015,
            TierProfile::Standard => 0.01,
            TierProfile::Premium => 0.05,
        }
    }

    /// The next tier up, used by escalation.
    pub fn escalate(self) -> TierProfile {
        match self {
            TierProfile::Cheap => TierProfile::Standard,
            TierProfile::Standard => TierProfile::Premium,
            TierProfile::Premium => TierProfile::Premium,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanaryStatus {
    None,
    Running,
    Passed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyCategory {
    Standard,
    Restricted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelIdentity {
    pub provider: String,
    pub model_id: String,
    pub status: ModelStatus,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub disabled_reason: Option<String>,
    #[serde(default)]
    pub disabled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub in_per_1k: f64,
    pub out_per_1k: f64,
    #[serde(default = "default_currency")]
    pub currency: Currency,
    #[serde(default)]
    pub min_charge_usd: Option<f64>,
}

fn default_currency() -> Currency {
    Currency::Usd
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Currency {
    Usd,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Guardrails {
    #[serde(default)]
    pub safety_category: Option<SafetyCategory>,
    #[serde(default)]
    pub restricted_use_cases: Vec<String>,
    #[serde(default)]
    pub high_risk_flag: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EligibilityRules {
    /// Model is only eligible when the package budget is at least this much.
    #[serde(default)]
    pub when_budget_above_min_usd: Option<f64>,
    /// Model is only eligible below this importance ceiling.
    #[serde(default)]
    pub when_importance_below_max: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanaryThresholds {
    #[serde(default = "default_probation_quality")]
    pub probation_quality: f64,
    #[serde(default = "default_graduate_quality")]
    pub graduate_quality: f64,
    #[serde(default = "default_probation_fail_count")]
    pub probation_fail_count: u32,
}

fn default_probation_quality() -> f64 {
    0.70
}
fn default_graduate_quality() -> f64 {
    0.82
}
fn default_probation_fail_count() -> u32 {
    2
}

impl Default for CanaryStatus {
    fn default() -> Self {
        CanaryStatus::None
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Governance {
    #[serde(default)]
    pub allowed_tiers: Option<Vec<TierProfile>>,
    #[serde(default)]
    pub blocked_providers: Vec<String>,
    #[serde(default)]
    pub blocked_task_types: Vec<String>,
    #[serde(default)]
    pub kill_switch: bool,
    #[serde(default)]
    pub max_cost_variance_ratio: Option<f64>,
    #[serde(default)]
    pub min_quality_prior: Option<f64>,
    #[serde(default)]
    pub canary_thresholds: Option<CanaryThresholds>,
    #[serde(default)]
    pub disable_auto_disable: bool,
    #[serde(default)]
    pub eligibility_rules: Option<EligibilityRules>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMeta {
    #[serde(default)]
    pub canary_status: CanaryStatus,
}

/// `ModelRegistryEntry`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRegistryEntry {
    pub id: String,
    pub identity: ModelIdentity,
    pub pricing: ModelPricing,
    #[serde(default)]
    pub expertise: HashMap<String, f64>,
    pub reliability: f64,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub guardrails: Guardrails,
    #[serde(default)]
    pub governance: Governance,
    #[serde(default)]
    pub performance_priors: Vec<ModelPerformancePrior>,
    #[serde(default)]
    pub evaluation_meta: EvaluationMeta,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ModelRegistryEntry {
    pub fn canonical_id(&self) -> &str {
        &self.id
    }

    pub fn expertise_for(&self, task_type: &str) -> f64 {
        self.expertise
            .get(task_type)
            .copied()
            .or_else(|| self.expertise.get("general").copied())
            .unwrap_or(0.0)
    }

    pub fn prior_for(&self, task_type: &str, difficulty: &str) -> Option<&ModelPerformancePrior> {
        self.performance_priors
            .iter()
            .find(|p| p.task_type == task_type && p.difficulty == difficulty)
    }

    pub fn prior_for_mut(
        &mut self,
        task_type: &str,
        difficulty: &str,
    ) -> &mut ModelPerformancePrior {
        if let Some(idx) = self
            .performance_priors
            .iter()
            .position(|p| p.task_type == task_type && p.difficulty == difficulty)
        {
            return &mut self.performance_priors[idx];
        }
        self.performance_priors.push(ModelPerformancePrior::new(
            task_type.to_string(),
            difficulty.to_string(),
        ));
        self.performance_priors.last_mut().unwrap()
    }
}

/// `ModelPerformancePrior`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPerformancePrior {
    pub task_type: String,
    pub difficulty: String,
    pub quality_prior: f64,
    pub cost_multiplier: f64,
    pub calibration_confidence: f64,
    #[serde(default)]
    pub variance_band_low: Option<f64>,
    #[serde(default)]
    pub variance_band_high: Option<f64>,
    pub sample_count: u64,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub defect_rate: Option<f64>,
}

impl ModelPerformancePrior {
    pub fn new(task_type: String, difficulty: String) -> Self {
        Self {
            task_type,
            difficulty,
            quality_prior: 0.5,
            cost_multiplier: 1.0,
            calibration_confidence: 0.0,
            variance_band_low: None,
            variance_band_high: None,
            sample_count: 0,
            last_updated: crate::domain::now(),
            defect_rate: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QaMode {
    Deterministic,
    Llm,
    Hybrid,
}

/// `ModelObservation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelObservation {
    pub model_id: String,
    pub task_type: String,
    pub difficulty: String,
    pub actual_cost_usd: f64,
    pub predicted_cost_usd: f64,
    pub actual_quality: f64,
    pub predicted_quality: f64,
    pub ts: DateTime<Utc>,
    #[serde(default)]
    pub run_session_id: Option<String>,
    #[serde(default)]
    pub package_id: Option<String>,
    #[serde(default)]
    pub defect_count: Option<u32>,
    pub qa_mode: QaMode,
    #[serde(default)]
    pub deterministic_no_signal: bool,
    #[serde(default)]
    pub budget_gated: bool,
}

/// `HrSignal`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HrSignal {
    pub model_id: String,
    pub previous_status: Option<ModelStatus>,
    pub new_status: Option<ModelStatus>,
    pub reason: String,
    pub ts: DateTime<Utc>,
    #[serde(default)]
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HrActionKind {
    Probation,
    Disable,
    Activate,
    KillSwitch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedBy {
    Evaluation,
    Ops,
}

/// `HrAction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HrAction {
    pub id: String,
    pub model_id: String,
    pub action: HrActionKind,
    pub reason: String,
    pub recommended_by: RecommendedBy,
    pub approved: Option<bool>,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub rejected_by: Option<String>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    pub ts: DateTime<Utc>,
}

impl HrAction {
    pub fn is_resolved(&self) -> bool {
        self.approved.is_some()
    }
}
