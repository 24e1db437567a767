//! `Ledger`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionType {
    Route,
    AuditPatch,
    Escalation,
    BudgetOptimization,
    ModelHrSignal,
    ProcurementFallback,
    Assembly,
    AssemblyFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    #[serde(rename = "type")]
    pub kind: DecisionType,
    #[serde(default)]
    pub package_id: Option<String>,
    pub details: serde_json::Value,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostKind {
    Council,
    Worker,
    Qa,
    DeterministicQa,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Costs {
    pub council_usd: f64,
    pub worker_usd: f64,
    pub qa_usd: f64,
    pub deterministic_qa_usd: f64,
}

impl Costs {
    pub fn total_usd(&self) -> f64 {
        self.council_usd + self.worker_usd + self.qa_usd + self.deterministic_qa_usd
    }

    pub fn add(&mut self, kind: CostKind, amount_usd: f64) {
        match kind {
            CostKind::Council => self.council_usd += amount_usd,
            CostKind::Worker => self.worker_usd += amount_usd,
            CostKind::Qa => self.qa_usd += amount_usd,
            CostKind::DeterministicQa => self.deterministic_qa_usd += amount_usd,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustDelta {
    pub model_id: String,
    pub role: String,
    pub delta: f64,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Variance {
    pub recorded: u64,
    pub skipped: u64,
    #[serde(default)]
    pub skip_reasons: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Counts {
    pub total_packages: u64,
    pub completed_packages: u64,
    pub failed_packages: u64,
    pub skipped_packages: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleExecution {
    pub package_id: String,
    pub role: String,
    pub model_id: String,
    pub duration_ms: u64,
}

/// `Ledger`, created at run start, appended concurrently, finalised at run end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    pub run_session_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<RunStatus>,
    pub counts: Counts,
    pub costs: Costs,
    #[serde(default)]
    pub trust_deltas: Vec<TrustDelta>,
    #[serde(default)]
    pub variance: Variance,
    pub decisions: Vec<Decision>,
    #[serde(default)]
    pub role_executions: Vec<RoleExecution>,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl Ledger {
    pub fn new(run_session_id: String) -> Self {
        Self {
            run_session_id,
            started_at: crate::domain::now(),
            finished_at: None,
            status: Some(RunStatus::Running),
            counts: Counts::default(),
            costs: Costs::default(),
            trust_deltas: Vec::new(),
            variance: Variance::default(),
            decisions: Vec::new(),
            role_executions: Vec::new(),
            meta: None,
            warnings: Vec::new(),
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.finished_at.is_some()
    }
}
