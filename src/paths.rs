//! Turning templated step paths into concrete filesystem paths.

use crate::vars::Variables;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

/// Substitute variables, normalize separators, absolutize against
/// `base_path`, then canonicalize if the path exists. The order is fixed.
pub fn resolve_path(raw: &str, vars: &Variables, base_path: &Path) -> PathBuf {
    let substituted = vars.substitute(raw);
    let normalized = normalize_separators(&substituted);

    let absolute = if is_absolute(&normalized) {
        PathBuf::from(normalized)
    } else {
        base_path.join(normalized.trim_start_matches(MAIN_SEPARATOR))
    };

    match dunce::canonicalize(&absolute) {
        Ok(canonical) => canonical,
        Err(_) => absolute,
    }
}

pub fn normalize_separators(path: &str) -> String {
    path.chars()
        .map(|c| if c == '/' || c == '\\' { MAIN_SEPARATOR } else { c })
        .collect()
}

/// Drive-letter (`C:\`) and UNC (`\\server`) prefixes count as absolute on
/// every platform, in addition to whatever the host considers absolute.
pub fn is_absolute(path: &str) -> bool {
    let bytes = path.as_bytes();
    let drive = bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && matches!(bytes[2], b'/' | b'\\');
    let unc = path.starts_with("\\\\") || path.starts_with("//");
    drive || unc || Path::new(path).is_absolute()
}

/// Whether a raw (unresolved) path names a directory by its trailing separator.
pub fn ends_with_separator(raw: &str) -> bool {
    raw.ends_with('/') || raw.ends_with('\\')
}

pub fn has_wildcard(path: &Path) -> bool {
    path.to_string_lossy().contains('*')
}
