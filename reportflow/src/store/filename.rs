//! Upload filename checks.

use regex::Regex;
use std::sync::LazyLock;

/// Extensions accepted for uploaded reports (compared case-insensitively).
pub const ALLOWED_EXTENSIONS: &[&str] = &["xlsx", "xls", "csv"];

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]").expect("filename pattern is valid"));

/// Returns true if `filename` ends in one of [`ALLOWED_EXTENSIONS`].
#[must_use]
pub fn extension_allowed(filename: &str) -> bool {
    let Some((stem, ext)) = filename.rsplit_once('.') else {
        return false;
    };
    !stem.is_empty()
        && ALLOWED_EXTENSIONS
            .iter()
            .any(|allowed| ext.eq_ignore_ascii_case(allowed))
}

/// Reduces a client-supplied filename to a safe single path component.
///
/// Directory components are dropped, characters outside `[A-Za-z0-9._-]`
/// become `_` and leading dots are removed. Returns `None` when nothing
/// remains.
#[must_use]
pub fn sanitize_filename(filename: &str) -> Option<String> {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let replaced = UNSAFE_CHARS.replace_all(base, "_");
    let cleaned = replaced.trim_start_matches('.');

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_') {
        None
    } else {
        Some(cleaned.to_string())
    }
}
