//! Turns an assembled run directory into a deliverable: copies it into a
//! clean workspace, optionally commits it with git, and zips it for
//! download.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tokio::process::Command;
use zip::write::FileOptions;
use zip::ZipWriter;

use crate::utils::is_valid_run_session_id;

pub struct MaterializeOptions {
    pub git_commit: bool,
}

pub struct MaterializeResult {
    pub deliverable_dir: PathBuf,
    pub zip_path: PathBuf,
    pub git_committed: bool,
}

/// Copies `run_dir` into `deliverables_root/<run_session_id>/`, zips it, and
/// (if requested and `run_session_id` passes validation) commits it with
/// git. `run_session_id` is validated before it ever reaches a shelled-out
/// command.
pub async fn materialize(
    run_dir: &Path,
    deliverables_root: &Path,
    run_session_id: &str,
    opts: MaterializeOptions,
) -> anyhow::Result<MaterializeResult> {
    if !is_valid_run_session_id(run_session_id) {
        anyhow::bail!("invalid run_session_id: {run_session_id}");
    }

    let deliverable_dir = deliverables_root.join(run_session_id);
    copy_dir_recursive(run_dir, &deliverable_dir).await?;

    let zip_path = deliverables_root.join(format!("{run_session_id}.zip"));
    zip_directory(&deliverable_dir, &zip_path)?;

    let git_committed = if opts.git_commit {
        commit_with_git(&deliverable_dir, run_session_id).await?
    } else {
        false
    };

    Ok(MaterializeResult {
        deliverable_dir,
        zip_path,
        git_committed,
    })
}

fn copy_dir_recursive<'a>(
    from: &'a Path,
    to: &'a Path,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send + 'a>> {
    Box::pin(async move {
        tokio::fs::create_dir_all(to).await?;
        let mut entries = tokio::fs::read_dir(from).await?;
        while let Some(entry) = entries.next_entry().await? {
            let dest = to.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                copy_dir_recursive(&entry.path(), &dest).await?;
            } else {
                tokio::fs::copy(entry.path(), dest).await?;
            }
        }
        Ok(())
    })
}

fn zip_directory(source: &Path, zip_path: &Path) -> anyhow::Result<()> {
    let file = File::create(zip_path)?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut stack = vec![source.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let rel = path.strip_prefix(source)?.to_string_lossy().replace('\\', "/");
            if path.is_dir() {
                zip.add_directory(format!("{rel}/"), options)?;
                stack.push(path);
            } else {
                zip.start_file(rel, options)?;
                let content = std::fs::read(&path)?;
                zip.write_all(&content)?;
            }
        }
    }
    zip.finish()?;
    Ok(())
}

/// `run_session_id` has already passed `is_valid_run_session_id`, so it is
/// safe to interpolate into the commit message.
async fn commit_with_git(deliverable_dir: &Path, run_session_id: &str) -> anyhow::Result<bool> {
    let init = Command::new("git")
        .arg("init")
        .arg("-q")
        .current_dir(deliverable_dir)
        .status()
        .await;
    if init.is_err() {
        return Ok(false);
    }

    Command::new("git")
        .args(["add", "-A"])
        .current_dir(deliverable_dir)
        .status()
        .await?;

    let status = Command::new("git")
        .args(["commit", "-q", "-m", &format!("deliverable: {run_session_id}")])
        .current_dir(deliverable_dir)
        .status()
        .await?;

    Ok(status.success())
}
