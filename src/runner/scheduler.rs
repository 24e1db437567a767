//! Topological scheduling of a work package DAG.
//!
//! Packages declare dependencies by id; the scheduler groups them into
//! waves where every package in a wave has all its dependencies satisfied
//! by an earlier wave, so the runner can execute a wave concurrently.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::domain::AtomicWorkPackage;

#[derive(Debug, Error, PartialEq)]
pub enum ScheduleError {
    #[error("dependency cycle detected among packages: {0:?}")]
    Cycle(Vec<String>),

    #[error("package {0} depends on unknown package {1}")]
    UnknownDependency(String, String),
}

/// Returns packages grouped into waves, each wave executable concurrently.
pub fn schedule_waves(
    packages: &[AtomicWorkPackage],
) -> Result<Vec<Vec<String>>, ScheduleError> {
    let by_id: HashMap<&str, &AtomicWorkPackage> =
        packages.iter().map(|p| (p.id.as_str(), p)).collect();

    for package in packages {
        for dep in &package.dependencies {
            if !by_id.contains_key(dep.as_str()) {
                return Err(ScheduleError::UnknownDependency(
                    package.id.clone(),
                    dep.clone(),
                ));
            }
        }
    }

    let mut remaining: HashSet<&str> = by_id.keys().copied().collect();
    let mut done: HashSet<&str> = HashSet::new();
    let mut waves = Vec::new();

    while !remaining.is_empty() {
        let ready: Vec<&str> = remaining
            .iter()
            .copied()
            .filter(|id| {
                by_id[id]
                    .dependencies
                    .iter()
                    .all(|dep| done.contains(dep.as_str()))
            })
            .collect();

        if ready.is_empty() {
            let mut stuck: Vec<String> = remaining.iter().map(|s| s.to_string()).collect();
            stuck.sort();
            return Err(ScheduleError::Cycle(stuck));
        }

        let mut wave: Vec<String> = ready.iter().map(|s| s.to_string()).collect();
        wave.sort();
        for id in &ready {
            remaining.remove(id);
            done.insert(id);
        }
        waves.push(wave);
    }

    Ok(waves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::*;
    use std::collections::HashMap as Map;

    fn pkg(id: &str, deps: &[&str]) -> AtomicWorkPackage {
        AtomicWorkPackage {
            id: id.to_string(),
            role: PackageRole::Worker,
            name: id.to_string(),
            acceptance_criteria: Vec::new(),
            inputs: Map::new(),
            outputs: Map::new(),
            dependencies: deps.iter().map(|s| s.to_string()).collect(),
            estimated_tokens: EstimatedTokens { input: 100, output: 100 },
            tier_profile_override: None,
            task_type: "code".to_string(),
            difficulty: "medium".to_string(),
            use_case_tags: Vec::new(),
        }
    }

    #[test]
    fn independent_packages_form_one_wave() {
        let pkgs = vec![pkg("a", &[]), pkg("b", &[])];
        let waves = schedule_waves(&pkgs).unwrap();
        assert_eq!(waves.len(), 1);
        assert_eq!(waves[0], vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn linear_chain_forms_sequential_waves() {
        let pkgs = vec![pkg("a", &[]), pkg("b", &["a"]), pkg("c", &["b"])];
        let waves = schedule_waves(&pkgs).unwrap();
        assert_eq!(waves, vec![vec!["a".to_string()], vec!["b".to_string()], vec!["c".to_string()]]);
    }

    #[test]
    fn cycle_is_detected() {
        let pkgs = vec![pkg("a", &["b"]), pkg("b", &["a"])];
        let err = schedule_waves(&pkgs).unwrap_err();
        assert!(matches!(err, ScheduleError::Cycle(_)));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let pkgs = vec![pkg("a", &["ghost"])];
        let err = schedule_waves(&pkgs).unwrap_err();
        assert!(matches!(err, ScheduleError::UnknownDependency(_, _)));
    }
}
