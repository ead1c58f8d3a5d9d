//! On-disk layout module
//!
//! Naming rules for work directories, path components and cache files.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

/// Maximum length of a single sanitized name, in characters
pub const MAX_NAME_LEN: usize = 200;

const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Replace filesystem-illegal characters with `_` and truncate to 200 characters
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if ILLEGAL_CHARS.contains(&c) || c.is_control() { '_' } else { c })
        .take(MAX_NAME_LEN)
        .collect();

    // A component must never walk out of its parent
    match cleaned.as_str() {
        "" | "." | ".." => "_".repeat(cleaned.len().max(1)),
        _ => cleaned,
    }
}

/// Destination root for a work: `<output>/RJ<id> <title>` or `<output>/RJ<id>`
pub fn work_root(output_dir: &Path, work_id: &str, title: Option<&str>) -> PathBuf {
    match title.map(str::trim).filter(|t| !t.is_empty()) {
        Some(title) => output_dir.join(sanitize_name(&format!("RJ{} {}", work_id, title))),
        None => output_dir.join(format!("RJ{}", work_id)),
    }
}

/// Location of the cached raw manifest for a work
pub fn manifest_cache_path(output_dir: &Path, work_id: &str) -> PathBuf {
    output_dir.join(format!("RJ{}_tracks.json", work_id))
}

fn work_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:RJ)?(?P<id>\d+)").expect("work id pattern is valid"))
}

/// Extract the numeric work id from inputs such as `RJ387142`, `rj387142` or `387142`
pub fn parse_work_id(input: &str) -> Option<String> {
    work_id_regex()
        .captures(input.trim())
        .and_then(|c| c.name("id"))
        .map(|m| m.as_str().to_string())
}

/// Parse every input, dropping invalid ones and repeats while keeping
/// first-seen order
pub fn collect_work_ids<I, S>(inputs: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut ids: Vec<String> = Vec::new();
    for input in inputs {
        match parse_work_id(input.as_ref()) {
            Some(id) if ids.contains(&id) => {}
            Some(id) => ids.push(id),
            None => warn!("Invalid RJ ID format: {}", input.as_ref()),
        }
    }
    ids
}
