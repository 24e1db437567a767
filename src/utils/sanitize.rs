//! Filename/id sanitisation shared by the file-mode storage driver
//! and the assembler/materialiser.

use std::sync::OnceLock;

use regex::Regex;

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize_filename(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

fn run_session_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap())
}

/// Guards a `runSessionId` before it is used in shell-adjacent contexts
/// (materialisation / git-commit step).
pub fn is_valid_run_session_id(id: &str) -> bool {
    !id.is_empty() && run_session_id_re().is_match(id)
}

/// Rejects path traversal: no `..`, no absolute paths, no empty segments
/// (assembly step).
pub fn is_safe_relative_path(path: &str) -> bool {
    if path.is_empty() || path.starts_with('/') || path.starts_with('\\') {
        return false;
    }
    path.split(['/', '\\']).all(|seg| !seg.is_empty() && seg != "..")
}
