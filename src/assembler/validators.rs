//! Strict validation of an aggregation report before assembly.
//!
//! Every file entry must carry a safe relative path and non-empty content;
//! the report as a whole must reference only package ids that were part of
//! the run. A report failing validation never reaches the filesystem.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::utils::is_safe_relative_path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationReport {
    pub run_session_id: String,
    pub package_id: String,
    pub files: Vec<FileEntry>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// File set every aggregation-report package must deliver.
const REQUIRED_PATHS: &[&str] = &[
    "package.json",
    "tsconfig.json",
    "src/parser.ts",
    "src/stats.ts",
    "src/cli.ts",
    "src/index.ts",
    "README.md",
];

/// Validates `report` against the set of package ids that belong to the
/// run. Returns the first violation found.
pub fn validate_aggregation_report(
    report: &AggregationReport,
    known_package_ids: &HashSet<String>,
) -> AppResult<()> {
    if !known_package_ids.contains(&report.package_id) {
        return Err(AppError::validation(format!(
            "package_id {} is not part of this run",
            report.package_id
        )));
    }

    if report.files.is_empty() {
        return Err(AppError::validation("aggregation report has no files"));
    }

    for file in &report.files {
        if !is_safe_relative_path(&file.path) {
            return Err(AppError::validation_with(
                "unsafe file path in aggregation report",
                serde_json::json!({"path": file.path}),
            ));
        }
        if file.content.is_empty() {
            return Err(AppError::validation_with(
                "empty file content in aggregation report",
                serde_json::json!({"path": file.path}),
            ));
        }
    }

    let mut seen = HashSet::new();
    for file in &report.files {
        if !seen.insert(&file.path) {
            return Err(AppError::validation_with(
                "duplicate file path in aggregation report",
                serde_json::json!({"path": file.path}),
            ));
        }
    }

    let present: HashSet<&str> = report.files.iter().map(|f| f.path.as_str()).collect();
    for required in REQUIRED_PATHS {
        if !present.contains(required) {
            return Err(AppError::validation_with(
                format!("Required file missing: \"{required}\""),
                serde_json::json!({"missing": required}),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known() -> HashSet<String> {
        ["p1".to_string()].into_iter().collect()
    }

    fn report() -> AggregationReport {
        AggregationReport {
            run_session_id: "run-1".to_string(),
            package_id: "p1".to_string(),
            files: REQUIRED_PATHS
                .iter()
                .map(|path| FileEntry {
                    path: path.to_string(),
                    content: format!("content for {path}"),
                })
                .collect(),
            notes: None,
        }
    }

    #[test]
    fn valid_report_passes() {
        assert!(validate_aggregation_report(&report(), &known()).is_ok());
    }

    #[test]
    fn missing_required_file_is_rejected() {
        let mut r = report();
        r.files.retain(|f| f.path != "src/cli.ts");
        let err = validate_aggregation_report(&r, &known()).unwrap_err();
        assert!(err.to_string().contains("src/cli.ts"));
    }

    #[test]
    fn unknown_package_id_is_rejected() {
        let mut r = report();
        r.package_id = "ghost".to_string();
        assert!(validate_aggregation_report(&r, &known()).is_err());
    }

    #[test]
    fn path_traversal_is_rejected() {
        let mut r = report();
        r.files[0].path = "../escape.ts".to_string();
        assert!(validate_aggregation_report(&r, &known()).is_err());
    }

    #[test]
    fn empty_content_is_rejected() {
        let mut r = report();
        r.files[0].content = String::new();
        assert!(validate_aggregation_report(&r, &known()).is_err());
    }

    #[test]
    fn duplicate_paths_are_rejected() {
        let mut r = report();
        r.files.push(r.files[0].clone());
        assert!(validate_aggregation_report(&r, &known()).is_err());
    }

    #[test]
    fn empty_file_list_is_rejected() {
        let mut r = report();
        r.files.clear();
        assert!(validate_aggregation_report(&r, &known()).is_err());
    }
}
