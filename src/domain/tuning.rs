//! `TuningProposal` and `PortfolioRecommendation`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortfolioMode {
    Off,
    Prefer,
    Lock,
}

impl Default for PortfolioMode {
    fn default() -> Self {
        PortfolioMode::Off
    }
}

/// 5-slot portfolio recommendation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioRecommendation {
    pub worker_cheap: Option<String>,
    pub worker_implementation: Option<String>,
    pub worker_strategy: Option<String>,
    pub qa_primary: Option<String>,
    pub qa_backup: Option<String>,
}

impl PortfolioRecommendation {
    pub fn slot_ids(&self) -> Vec<&str> {
        [
            &self.worker_cheap,
            &self.worker_implementation,
            &self.worker_strategy,
            &self.qa_primary,
            &self.qa_backup,
        ]
        .into_iter()
        .filter_map(|s| s.as_deref())
        .collect()
    }

    /// Slot ids relevant to routing a package of the given role: worker
    /// packages get the worker slots, QA packages get the QA slots.
    pub fn slot_ids_for_role(&self, role: crate::domain::PackageRole) -> Vec<&str> {
        match role {
            crate::domain::PackageRole::Worker => [
                &self.worker_cheap,
                &self.worker_implementation,
                &self.worker_strategy,
            ]
            .into_iter()
            .filter_map(|s| s.as_deref())
            .collect(),
            crate::domain::PackageRole::Qa => [&self.qa_primary, &self.qa_backup]
                .into_iter()
                .filter_map(|s| s.as_deref())
                .collect(),
        }
    }
}

/// `TuningProposal`. `id` is a stable hash of action+details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningProposal {
    pub id: String,
    pub action: TuningAction,
    pub details: serde_json::Value,
    pub rationale: String,
    pub safe_to_auto_apply: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TuningAction {
    SetPortfolioMode,
    RefreshPortfolio,
    LowerMinPredictedQuality,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TuningConfig {
    pub enabled: bool,
    pub allow_auto_apply: bool,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_auto_apply: false,
        }
    }
}
