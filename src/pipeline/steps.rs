//! Execution of the file-shaping steps that follow the download.

use crate::archive::{ArchiveExtractor, ArchiveKind};
use crate::error::{ConfigError, Error, FileOpError, Result};
use crate::fileops::{expand_wildcard, FileOps};
use crate::paths::{ends_with_separator, has_wildcard, resolve_path};
use crate::scanner;
use crate::types::{CopySpec, ExtractSpec, MoveSpec, RemoveSpec, SleepSpec, Step};
use crate::vars::{Variables, APP_PATH, BASE_NAME, FINAL_DIR, TEMP_DIR};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct StepExecutor {
    extractor: ArchiveExtractor,
    file_ops: FileOps,
}

impl StepExecutor {
    pub fn new(extractor: ArchiveExtractor, file_ops: FileOps) -> Self {
        Self {
            extractor,
            file_ops,
        }
    }

    /// Runs `step` (at position `index` in the config) against the run's
    /// variables. Failures come back as [`Error::Step`].
    pub async fn execute(&self, index: usize, step: &Step, vars: &mut Variables) -> Result<()> {
        tracing::debug!("Step {}: {}", index, step.kind());
        let result = match step {
            Step::Download(_) => Err(ConfigError::UnexpectedDownload { index }.into()),
            Step::Extract7z(spec) => self.extract(ArchiveKind::SevenZip, spec, vars),
            Step::ExtractZip(spec) => self.extract(ArchiveKind::Zip, spec, vars),
            Step::Move(spec) => self.move_entries(spec, vars),
            Step::Remove(spec) => self.remove(spec, vars),
            Step::Copy(spec) => self.copy_from_previous(spec, vars),
            Step::Sleep(spec) => {
                sleep(spec).await;
                Ok(())
            }
        };

        result.map_err(|source| Error::Step {
            index,
            kind: step.kind(),
            source: Box::new(source),
        })
    }

    fn extract(&self, kind: ArchiveKind, spec: &ExtractSpec, vars: &Variables) -> Result<()> {
        let app_path = vars.require_path(APP_PATH)?;
        let source = locate_source(spec.source(), vars, &app_path);

        let target = match spec.target() {
            Some(to) => resolve_path(to, vars, &app_path),
            None => match vars.final_dir() {
                Some(final_dir) => final_dir,
                None => source
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| app_path.clone()),
            },
        };

        tracing::debug!("{} {} -> {}", kind.as_str(), source.display(), target.display());
        self.extractor.extract(kind, &source, &target)?;
        Ok(())
    }

    fn move_entries(&self, spec: &MoveSpec, vars: &Variables) -> Result<()> {
        let app_path = vars.require_path(APP_PATH)?;
        let from = locate_source(&spec.from, vars, &app_path);
        let to = resolve_path(&spec.to, vars, &app_path);

        if has_wildcard(&from) {
            let matches = expand_wildcard(&from)?;
            if matches.is_empty() {
                return Err(FileOpError::NoMatch(from.display().to_string()).into());
            }
            for entry in matches {
                let dest = to.join(file_name(&entry));
                tracing::debug!("Moving {} -> {}", entry.display(), dest.display());
                self.file_ops.move_file_or_dir(&entry, &dest)?;
            }
            return Ok(());
        }

        if !from.exists() {
            return Err(FileOpError::MissingSource(from).into());
        }
        let dest = if ends_with_separator(&spec.to) || to.is_dir() {
            to.join(file_name(&from))
        } else {
            to
        };
        tracing::debug!("Moving {} -> {}", from.display(), dest.display());
        self.file_ops.move_file_or_dir(&from, &dest)?;
        Ok(())
    }

    fn remove(&self, spec: &RemoveSpec, vars: &Variables) -> Result<()> {
        let app_path = vars.require_path(APP_PATH)?;
        let target = resolve_path(spec.path(), vars, &app_path);

        let targets = if has_wildcard(&target) {
            expand_wildcard(&target)?
        } else {
            vec![target]
        };
        if targets.is_empty() {
            tracing::debug!("Nothing matches {}", spec.path());
        }

        for target in targets {
            tracing::debug!("Removing {}", target.display());
            self.file_ops.remove_recursive(&target)?;
        }
        Ok(())
    }

    /// Carries files over from the install the link currently points at.
    fn copy_from_previous(&self, spec: &CopySpec, vars: &Variables) -> Result<()> {
        let app_path = vars.require_path(APP_PATH)?;
        let base_name = vars.require(BASE_NAME)?;
        let final_dir = vars.final_dir();

        let Some(previous) =
            scanner::find_previous_installation(&app_path, base_name, final_dir.as_deref())
        else {
            tracing::info!("No previous installation, nothing to copy for {}", spec.from);
            return Ok(());
        };

        let from = resolve_path(&spec.from, vars, &previous);
        let sources = if has_wildcard(&from) {
            expand_wildcard(&from)?
        } else if from.exists() {
            vec![from.clone()]
        } else {
            Vec::new()
        };
        if sources.is_empty() {
            tracing::info!("{} not found in previous installation, skipping", from.display());
            return Ok(());
        }

        let (to, into_dir) = match &spec.to {
            Some(raw) => {
                let to = resolve_path(raw, vars, &app_path);
                let into_dir = ends_with_separator(raw) || to.is_dir() || sources.len() > 1;
                (to, into_dir)
            }
            None => (vars.require_path(TEMP_DIR)?, true),
        };

        for source in sources {
            let dest = if into_dir {
                to.join(file_name(&source))
            } else {
                to.clone()
            };
            tracing::debug!("Copying {} -> {}", source.display(), dest.display());
            self.file_ops.copy_file_or_dir(&source, &dest)?;
        }
        Ok(())
    }
}

async fn sleep(spec: &SleepSpec) {
    let seconds = spec.seconds();
    if seconds <= 0 {
        return;
    }
    tracing::info!("Sleeping for {} second(s)", seconds);
    tokio::time::sleep(Duration::from_secs(seconds.unsigned_abs())).await;
}

/// Resolves a source path against the application root, then the scratch
/// directory, then the install directory, keeping the first that exists.
/// For wildcards the parent directory has to exist.
fn locate_source(raw: &str, vars: &Variables, app_path: &Path) -> PathBuf {
    let exists = |path: &Path| {
        if has_wildcard(path) {
            path.parent().is_some_and(Path::is_dir)
        } else {
            path.exists()
        }
    };

    let primary = resolve_path(raw, vars, app_path);
    if exists(&primary) {
        return primary;
    }

    for key in [TEMP_DIR, FINAL_DIR] {
        let Some(base) = vars.get(key).filter(|v| !v.is_empty()) else {
            continue;
        };
        let candidate = resolve_path(raw, vars, Path::new(base));
        if exists(&candidate) {
            tracing::debug!("Found {} under ${}", raw, key);
            return candidate;
        }
    }
    primary
}

fn file_name(path: &Path) -> &std::ffi::OsStr {
    path.file_name().unwrap_or(path.as_os_str())
}
