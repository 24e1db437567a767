//! `AtomicWorkPackage`, consumed by the runner.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::TierProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageRole {
    Worker,
    Qa,
}

/// Immutable input to the runner. Packages form a DAG via `dependencies`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomicWorkPackage {
    pub id: String,
    pub role: PackageRole,
    pub name: String,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub inputs: HashMap<String, String>,
    #[serde(default)]
    pub outputs: HashMap<String, String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub estimated_tokens: EstimatedTokens,
    #[serde(default)]
    pub tier_profile_override: Option<TierProfile>,
    /// Stable task type used for eligibility/scoring (e.g. "code", "writing", "analysis").
    pub task_type: String,
    /// Difficulty bucket used for token estimation and scoring priors.
    pub difficulty: String,
    /// Use-case tags checked against a candidate model's restricted use cases.
    #[serde(default)]
    pub use_case_tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimatedTokens {
    pub input: u32,
    pub output: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageState {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}
