//! Installed versions under an application root.

use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Name prefix of per-run scratch directories inside an application root.
pub const TEMP_DIR_PREFIX: &str = ".temp_";

fn archive_ext() -> &'static Regex {
    static EXT: OnceLock<Regex> = OnceLock::new();
    EXT.get_or_init(|| Regex::new(r"(?i)\.(zip|7z)$").expect("extension regex is valid"))
}

/// Directory names plus archive basenames. Links and scratch directories
/// are not versions.
pub fn local_versions(app_path: &Path) -> BTreeSet<String> {
    let mut versions = BTreeSet::new();
    let Ok(entries) = fs::read_dir(app_path) else {
        tracing::debug!("Cannot list {}", app_path.display());
        return versions;
    };

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_dir() && !name.starts_with(TEMP_DIR_PREFIX) {
            versions.insert(name.clone());
        }
        if !file_type.is_dir() && archive_ext().is_match(&name) {
            versions.insert(archive_ext().replace(&name, "").into_owned());
        }
    }
    versions
}

pub fn is_installed(app_path: &Path, version: &str) -> bool {
    local_versions(app_path)
        .iter()
        .any(|v| v.eq_ignore_ascii_case(version))
}

/// Where the currently active install lives: the link target if it
/// resolves, otherwise the lexicographically last version directory.
pub fn find_previous_installation(
    app_path: &Path,
    link_name: &str,
    exclude_dir: Option<&Path>,
) -> Option<PathBuf> {
    let link_path = app_path.join(link_name);
    if let Ok(target) = fs::read_link(&link_path) {
        let target = if target.is_absolute() {
            target
        } else {
            app_path.join(target)
        };
        if target.is_dir() {
            tracing::debug!("Found previous installation via link: {}", target.display());
            return Some(target);
        }
    }

    let excluded = exclude_dir.and_then(|dir| dunce::canonicalize(dir).ok());
    let mut candidates: Vec<String> = fs::read_dir(app_path)
        .ok()?
        .flatten()
        .filter(|entry| entry.path().is_dir())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| !name.starts_with(TEMP_DIR_PREFIX))
        .filter(|name| !name.eq_ignore_ascii_case(link_name))
        .filter(|name| match &excluded {
            Some(excluded) => {
                dunce::canonicalize(app_path.join(name)).ok().as_ref() != Some(excluded)
            }
            None => true,
        })
        .collect();

    candidates.sort();
    match candidates.pop() {
        Some(last) => {
            let previous = app_path.join(last);
            tracing::debug!(
                "Found previous installation (alphabetically last): {}",
                previous.display()
            );
            Some(previous)
        }
        None => {
            tracing::debug!("No previous installation found");
            None
        }
    }
}
