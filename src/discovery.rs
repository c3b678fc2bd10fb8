//! Finding managed applications and their configs under the software root.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// One config file of one application folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfigSource {
    /// Folder name directly under the root.
    pub folder: String,
    pub app_path: PathBuf,
    /// Config file stem; also the link name.
    pub base_name: String,
    pub config_path: PathBuf,
}

/// Every `*.json` file in every immediate subdirectory of `root`, both
/// levels sorted by name. Only an unreadable root is an error.
pub fn discover_apps(root: &Path) -> io::Result<Vec<AppConfigSource>> {
    let mut folders: Vec<PathBuf> = fs::read_dir(root)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    folders.sort();

    let mut apps = Vec::new();
    for app_path in folders {
        let folder = app_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if folder.starts_with('.') {
            continue;
        }

        let configs = match config_files(&app_path) {
            Ok(configs) => configs,
            Err(e) => {
                tracing::warn!("Cannot list {}: {}", app_path.display(), e);
                continue;
            }
        };
        for config_path in configs {
            let base_name = config_path
                .file_stem()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            apps.push(AppConfigSource {
                folder: folder.clone(),
                app_path: app_path.clone(),
                base_name,
                config_path,
            });
        }
    }

    tracing::debug!("Discovered {} config(s) under {}", apps.len(), root.display());
    Ok(apps)
}

fn config_files(app_path: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(app_path)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        })
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_discover_apps_sorted() {
        let root = tempdir().unwrap();
        let beta = root.path().join("beta");
        let alpha = root.path().join("alpha");
        fs::create_dir_all(beta.join("1.0")).unwrap();
        fs::create_dir_all(&alpha).unwrap();
        fs::create_dir_all(root.path().join(".cache")).unwrap();
        fs::write(beta.join("Zed.json"), "{}").unwrap();
        fs::write(beta.join("Beta.JSON"), "{}").unwrap();
        fs::write(beta.join("notes.txt"), "").unwrap();
        fs::write(alpha.join("Alpha.json"), "{}").unwrap();
        fs::write(root.path().join("stray.json"), "{}").unwrap();

        let apps = discover_apps(root.path()).unwrap();
        let names: Vec<_> = apps
            .iter()
            .map(|a| format!("{}/{}", a.folder, a.base_name))
            .collect();
        assert_eq!(names, vec!["alpha/Alpha", "beta/Beta", "beta/Zed"]);
        assert_eq!(apps[1].app_path, beta);
        assert_eq!(apps[1].config_path, beta.join("Beta.JSON"));
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let root = tempdir().unwrap();
        assert!(discover_apps(&root.path().join("nope")).is_err());
    }
}
