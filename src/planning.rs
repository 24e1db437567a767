//! Directive planning and packaging: turns a free-text directive into
//! `ProjectSubtask`s via the deterministic decomposer, estimates their cost
//! against a project budget, and materialises accepted subtasks into
//! `AtomicWorkPackage`s for the runner.

use std::collections::HashMap;

use serde::Serialize;

use crate::collaborators::{DirectiveDecomposer, ProjectSubtask};
use crate::domain::{AtomicWorkPackage, EstimatedTokens, PackageRole, TierProfile};
use crate::router::estimate_tokens_for_task;

/// Splits a directive into one subtask per non-empty line, inferring a task
/// type from simple keyword matching and a difficulty from line length.
/// Ships as the one concrete `DirectiveDecomposer` alongside `MockLlmExecutor`.
pub struct LineDirectiveDecomposer;

impl DirectiveDecomposer for LineDirectiveDecomposer {
    fn decompose(&self, directive: &str) -> Vec<ProjectSubtask> {
        directive
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .enumerate()
            .map(|(i, line)| {
                let task_type = infer_task_type(line);
                let difficulty = infer_difficulty(line);
                ProjectSubtask {
                    id: format!("subtask-{i}"),
                    description: line.to_string(),
                    task_type,
                    difficulty,
                    dependencies: if i == 0 { Vec::new() } else { vec![format!("subtask-{}", i - 1)] },
                }
            })
            .collect()
    }
}

fn infer_task_type(line: &str) -> String {
    let lower = line.to_lowercase();
    if lower.contains("test") || lower.contains("qa") || lower.contains("review") {
        "qa".to_string()
    } else if lower.contains("plan") || lower.contains("design") || lower.contains("architecture") {
        "planning".to_string()
    } else if lower.contains("doc") || lower.contains("writ") {
        "writing".to_string()
    } else {
        "code".to_string()
    }
}

fn infer_difficulty(line: &str) -> String {
    match line.len() {
        0..=40 => "easy".to_string(),
        41..=100 => "medium".to_string(),
        101..=200 => "hard".to_string(),
        _ => "complex".to_string(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanResult {
    pub subtasks: Vec<ProjectSubtask>,
    pub underfunded: bool,
    pub budget_warnings: Vec<String>,
}

/// Plans `directive` against `project_budget_usd`: decomposes it, then flags
/// the plan underfunded if the sum of rough per-subtask cost estimates at
/// `tier` exceeds the budget.
pub fn plan_project(
    decomposer: &dyn DirectiveDecomposer,
    directive: &str,
    project_budget_usd: f64,
    tier: TierProfile,
) -> PlanResult {
    let subtasks = decomposer.decompose(directive);
    let mut total_estimate = 0.0;
    let mut budget_warnings = Vec::new();

    for subtask in &subtasks {
        let (input, output) = estimate_tokens_for_task(subtask.description.len(), &subtask.difficulty);
        let rough_cost = ((input + output) as f64 / 1000.0) * tier.threshold_usd();
        total_estimate += rough_cost;
    }

    let underfunded = total_estimate > project_budget_usd;
    if underfunded {
        budget_warnings.push(format!(
            "estimated cost {total_estimate:.4} USD exceeds project budget {project_budget_usd:.4} USD"
        ));
    }

    PlanResult {
        subtasks,
        underfunded,
        budget_warnings,
    }
}

/// Materialises `subtasks` into atomic work packages: one worker package per
/// subtask, plus a trailing QA package depending on every worker package.
pub fn package_project(subtasks: &[ProjectSubtask]) -> Vec<AtomicWorkPackage> {
    let mut packages: Vec<AtomicWorkPackage> = subtasks
        .iter()
        .map(|s| {
            let (input, output) = estimate_tokens_for_task(s.description.len(), &s.difficulty);
            AtomicWorkPackage {
                id: s.id.clone(),
                role: PackageRole::Worker,
                name: s.description.clone(),
                acceptance_criteria: Vec::new(),
                inputs: HashMap::new(),
                outputs: HashMap::new(),
                dependencies: s.dependencies.clone(),
                estimated_tokens: EstimatedTokens { input, output },
                tier_profile_override: None,
                task_type: s.task_type.clone(),
                difficulty: s.difficulty.clone(),
                use_case_tags: Vec::new(),
            }
        })
        .collect();

    if !packages.is_empty() {
        let worker_ids: Vec<String> = packages.iter().map(|p| p.id.clone()).collect();
        packages.push(AtomicWorkPackage {
            id: "qa-final".to_string(),
            role: PackageRole::Qa,
            name: "final QA pass".to_string(),
            acceptance_criteria: Vec::new(),
            inputs: HashMap::new(),
            outputs: HashMap::new(),
            dependencies: worker_ids,
            estimated_tokens: EstimatedTokens { input: 500, output: 200 },
            tier_profile_override: None,
            task_type: "qa".to_string(),
            difficulty: "medium".to_string(),
            use_case_tags: Vec::new(),
        });
    }

    packages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decomposes_one_subtask_per_line() {
        let decomposer = LineDirectiveDecomposer;
        let subtasks = decomposer.decompose("write the parser\nwrite tests for the parser");
        assert_eq!(subtasks.len(), 2);
        assert_eq!(subtasks[1].dependencies, vec!["subtask-0".to_string()]);
    }

    #[test]
    fn small_budget_marks_plan_underfunded() {
        let decomposer = LineDirectiveDecomposer;
        let result = plan_project(&decomposer, "implement a very large distributed system from scratch", 0.0000001, TierProfile::Premium);
        assert!(result.underfunded);
        assert!(!result.budget_warnings.is_empty());
    }

    #[test]
    fn packaging_appends_trailing_qa_package() {
        let decomposer = LineDirectiveDecomposer;
        let subtasks = decomposer.decompose("write the parser\nwrite tests");
        let packages = package_project(&subtasks);
        assert_eq!(packages.len(), 3);
        assert_eq!(packages.last().unwrap().role, PackageRole::Qa);
        assert_eq!(packages.last().unwrap().dependencies.len(), 2);
    }

    #[test]
    fn empty_directive_packages_to_nothing() {
        let decomposer = LineDirectiveDecomposer;
        let subtasks = decomposer.decompose("");
        assert!(package_project(&subtasks).is_empty());
    }
}
