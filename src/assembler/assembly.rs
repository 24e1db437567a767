//! Writes a validated aggregation report to disk, records a content hash
//! manifest, and runs an optional `tsc --noEmit` verification pass.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::process::Command;

use crate::assembler::validators::AggregationReport;
use crate::utils::sha256_hex;

#[derive(Debug, Clone, Serialize)]
pub struct ManifestEntry {
    pub path: String,
    pub sha256: String,
    pub bytes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssemblyResult {
    pub run_dir: PathBuf,
    pub manifest: Vec<ManifestEntry>,
    pub type_check: Option<TypeCheckResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TypeCheckResult {
    pub passed: bool,
    pub output: String,
}

/// Writes every file in `report` under `workspace_root/report.package_id/`,
/// then writes a `manifest.json` alongside them.
pub async fn assemble(workspace_root: &Path, report: &AggregationReport) -> anyhow::Result<AssemblyResult> {
    let run_dir = workspace_root.join(&report.package_id);
    tokio::fs::create_dir_all(&run_dir).await?;

    let mut manifest = Vec::with_capacity(report.files.len());
    for file in &report.files {
        let dest = run_dir.join(&file.path);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&dest, &file.content).await?;
        manifest.push(ManifestEntry {
            path: file.path.clone(),
            sha256: sha256_hex(file.content.as_bytes()),
            bytes: file.content.len(),
        });
    }

    let manifest_path = run_dir.join("manifest.json");
    tokio::fs::write(&manifest_path, serde_json::to_vec_pretty(&manifest)?).await?;

    Ok(AssemblyResult {
        run_dir,
        manifest,
        type_check: None,
    })
}

/// Runs `tsc --noEmit` inside `run_dir` if a `tsconfig.json` is present and
/// the `tsc` binary resolves; otherwise returns `None` rather than failing
/// the assembly (TypeScript verification is advisory, not a hard gate).
pub async fn verify_with_tsc(run_dir: &Path) -> Option<TypeCheckResult> {
    if !run_dir.join("tsconfig.json").exists() {
        return None;
    }

    let output = Command::new("tsc")
        .arg("--noEmit")
        .current_dir(run_dir)
        .output()
        .await
        .ok()?;

    Some(TypeCheckResult {
        passed: output.status.success(),
        output: String::from_utf8_lossy(&output.stdout).into_owned()
            + &String::from_utf8_lossy(&output.stderr),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::validators::FileEntry;

    fn report() -> AggregationReport {
        AggregationReport {
            run_session_id: "run-1".to_string(),
            package_id: "p1".to_string(),
            files: vec![FileEntry {
                path: "src/index.ts".to_string(),
                content: "export const x = 1;".to_string(),
            }],
            notes: None,
        }
    }

    #[tokio::test]
    async fn assemble_writes_files_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let result = assemble(dir.path(), &report()).await.unwrap();
        assert_eq!(result.manifest.len(), 1);
        let written = tokio::fs::read_to_string(result.run_dir.join("src/index.ts")).await.unwrap();
        assert_eq!(written, "export const x = 1;");
        assert!(result.run_dir.join("manifest.json").exists());
    }

    #[tokio::test]
    async fn manifest_hash_matches_content() {
        let dir = tempfile::tempdir().unwrap();
        let result = assemble(dir.path(), &report()).await.unwrap();
        let expected = sha256_hex(b"export const x = 1;");
        assert_eq!(result.manifest[0].sha256, expected);
    }

    #[tokio::test]
    async fn tsc_verification_skipped_without_tsconfig() {
        let dir = tempfile::tempdir().unwrap();
        let result = assemble(dir.path(), &report()).await.unwrap();
        let check = verify_with_tsc(&result.run_dir).await;
        assert!(check.is_none());
    }
}
