//! Filesystem operations that tolerate transiently locked files.
//!
//! Virus scanners and indexers on Windows briefly hold freshly extracted
//! files open, so renames retry with exponential backoff when the failure
//! looks like a sharing violation. Any other error fails immediately.

use crate::error::FileOpError;
use filetime::FileTime;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

/// Decides whether an I/O error is worth retrying.
pub type TransientPredicate = fn(&io::Error) -> bool;

// ERROR_SHARING_VIOLATION, ERROR_ACCESS_DENIED on Windows; EBUSY, ETXTBSY elsewhere.
const TRANSIENT_OS_ERRORS: &[i32] = if cfg!(windows) { &[32, 5] } else { &[16, 26] };

// ERROR_NOT_SAME_DEVICE on Windows; EXDEV elsewhere.
const CROSS_DEVICE_OS_ERROR: i32 = if cfg!(windows) { 17 } else { 18 };

pub fn is_transient_lock_error(err: &io::Error) -> bool {
    err.raw_os_error()
        .is_some_and(|code| TRANSIENT_OS_ERRORS.contains(&code))
}

#[derive(Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    /// Pause before the single extra attempt after `max_attempts` transient failures.
    pub final_delay: Duration,
    pub is_transient: TransientPredicate,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            final_delay: Duration::from_secs(60),
            is_transient: is_transient_lock_error,
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("initial_delay", &self.initial_delay)
            .field("final_delay", &self.final_delay)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    /// Same classification and attempt count, but no sleeping.
    pub fn without_delays(self) -> Self {
        Self {
            initial_delay: Duration::ZERO,
            final_delay: Duration::ZERO,
            ..self
        }
    }

    pub fn run<T>(&self, mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
        let mut delay = self.initial_delay;
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if !(self.is_transient)(&err) => return Err(err),
                Err(err) => {
                    if attempt >= self.max_attempts {
                        tracing::warn!(
                            "Still locked after {} attempts ({}), waiting {:?} for a last try",
                            attempt,
                            err,
                            self.final_delay
                        );
                        std::thread::sleep(self.final_delay);
                        return op();
                    }
                    tracing::debug!(
                        "Attempt {} failed ({}), retrying in {:?}",
                        attempt,
                        err,
                        delay
                    );
                    std::thread::sleep(delay);
                    delay *= 2;
                    attempt += 1;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FileOps {
    policy: RetryPolicy,
}

impl FileOps {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Rename with the retry policy. The caller creates `dst`'s parent.
    pub fn retrying_rename(&self, src: &Path, dst: &Path) -> Result<(), FileOpError> {
        self.policy
            .run(|| fs::rename(src, dst))
            .map_err(|source| FileOpError::Rename {
                from: src.to_path_buf(),
                to: dst.to_path_buf(),
                source,
            })
    }

    /// Rename, falling back to copy + remove when `dst` is on another device.
    pub fn move_file_or_dir(&self, src: &Path, dst: &Path) -> Result<(), FileOpError> {
        if fs::symlink_metadata(src).is_err() {
            return Err(FileOpError::MissingSource(src.to_path_buf()));
        }
        create_parent(dst)?;

        match self.retrying_rename(src, dst) {
            Ok(()) => Ok(()),
            Err(FileOpError::Rename { source, .. })
                if source.raw_os_error() == Some(CROSS_DEVICE_OS_ERROR) =>
            {
                tracing::debug!(
                    "{} and {} are on different devices, copying instead",
                    src.display(),
                    dst.display()
                );
                self.copy_file_or_dir(src, dst)?;
                self.remove_recursive(src)
            }
            Err(err) => Err(err),
        }
    }

    /// Recursive copy that keeps each file's modification time.
    pub fn copy_file_or_dir(&self, src: &Path, dst: &Path) -> Result<(), FileOpError> {
        if !src.exists() {
            return Err(FileOpError::MissingSource(src.to_path_buf()));
        }

        if src.is_file() {
            create_parent(dst)?;
            return copy_file_with_mtime(src, dst);
        }

        create_dir(dst)?;
        for entry in WalkDir::new(src).min_depth(1).follow_links(true) {
            let entry = entry.map_err(|err| FileOpError::Copy {
                from: src.to_path_buf(),
                to: dst.to_path_buf(),
                source: err.into(),
            })?;
            let relative = entry
                .path()
                .strip_prefix(src)
                .unwrap_or_else(|_| entry.path());
            let target = dst.join(relative);

            if entry.file_type().is_dir() {
                create_dir(&target)?;
            } else {
                create_parent(&target)?;
                copy_file_with_mtime(entry.path(), &target)?;
            }
        }
        Ok(())
    }

    /// Depth-first removal. A missing path counts as removed.
    pub fn remove_recursive(&self, path: &Path) -> Result<(), FileOpError> {
        let metadata = match fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(FileOpError::Remove {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let removal = if metadata.file_type().is_symlink() {
            // Directory symlinks and junctions on Windows need remove_dir.
            self.policy
                .run(|| fs::remove_file(path).or_else(|_| fs::remove_dir(path)))
        } else if metadata.is_dir() {
            let entries = fs::read_dir(path).map_err(|source| FileOpError::Remove {
                path: path.to_path_buf(),
                source,
            })?;
            for entry in entries.flatten() {
                self.remove_recursive(&entry.path())?;
            }
            self.policy.run(|| fs::remove_dir(path))
        } else {
            self.policy.run(|| fs::remove_file(path))
        };

        removal.map_err(|source| FileOpError::Remove {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Entries matching a single-level wildcard such as `dir/*.dll`. A missing
/// base directory yields no matches.
pub fn expand_wildcard(pattern_path: &Path) -> Result<Vec<PathBuf>, FileOpError> {
    let file_pattern = pattern_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base_dir = pattern_path.parent().unwrap_or_else(|| Path::new("."));
    if !base_dir.is_dir() {
        tracing::debug!("Base directory does not exist: {}", base_dir.display());
        return Ok(Vec::new());
    }

    let pattern = format!(
        "{}{}{}",
        glob::Pattern::escape(&base_dir.to_string_lossy()),
        std::path::MAIN_SEPARATOR,
        file_pattern
    );
    let paths = glob::glob(&pattern).map_err(|source| FileOpError::Pattern {
        pattern: pattern.clone(),
        source,
    })?;

    let mut matches: Vec<PathBuf> = paths.flatten().collect();
    matches.sort();
    Ok(matches)
}

fn copy_file_with_mtime(src: &Path, dst: &Path) -> Result<(), FileOpError> {
    let copy_err = |source| FileOpError::Copy {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source,
    };
    fs::copy(src, dst).map_err(copy_err)?;
    let metadata = fs::metadata(src).map_err(copy_err)?;
    filetime::set_file_mtime(dst, FileTime::from_last_modification_time(&metadata))
        .map_err(copy_err)
}

fn create_dir(path: &Path) -> Result<(), FileOpError> {
    fs::create_dir_all(path).map_err(|source| FileOpError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

fn create_parent(path: &Path) -> Result<(), FileOpError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => create_dir(parent),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::tempdir;

    fn always_transient(_: &io::Error) -> bool {
        true
    }

    fn never_transient(_: &io::Error) -> bool {
        false
    }

    fn fast_policy(is_transient: TransientPredicate) -> RetryPolicy {
        RetryPolicy {
            is_transient,
            ..RetryPolicy::default()
        }
        .without_delays()
    }

    fn locked() -> io::Error {
        io::Error::new(io::ErrorKind::Other, "file in use")
    }

    #[test]
    fn test_non_transient_error_is_not_retried() {
        let attempts = Cell::new(0);
        let result: io::Result<()> = fast_policy(never_transient).run(|| {
            attempts.set(attempts.get() + 1);
            Err(locked())
        });
        assert!(result.is_err());
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn test_transient_errors_retry_until_success_on_tenth_attempt() {
        let attempts = Cell::new(0);
        let result = fast_policy(always_transient).run(|| {
            attempts.set(attempts.get() + 1);
            if attempts.get() < 10 {
                Err(locked())
            } else {
                Ok(attempts.get())
            }
        });
        assert_eq!(result.unwrap(), 10);
    }

    #[test]
    fn test_one_extra_attempt_after_exhausting_retries() {
        let attempts = Cell::new(0);
        let result: io::Result<()> = fast_policy(always_transient).run(|| {
            attempts.set(attempts.get() + 1);
            Err(locked())
        });
        assert!(result.is_err());
        assert_eq!(attempts.get(), 11);
    }

    #[test]
    fn test_default_predicate_classifies_os_codes() {
        let code = TRANSIENT_OS_ERRORS[0];
        assert!(is_transient_lock_error(&io::Error::from_raw_os_error(code)));
        assert!(!is_transient_lock_error(&io::Error::from_raw_os_error(2)));
        assert!(!is_transient_lock_error(&locked()));
    }

    #[test]
    fn test_copy_directory_preserves_mtime() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("nested").join("a.txt"), "hello").unwrap();
        let old = FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(src.join("nested").join("a.txt"), old).unwrap();

        let dst = dir.path().join("dst");
        FileOps::default().copy_file_or_dir(&src, &dst).unwrap();

        let copied = dst.join("nested").join("a.txt");
        assert_eq!(fs::read_to_string(&copied).unwrap(), "hello");
        let meta = fs::metadata(&copied).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&meta), old);
    }

    #[test]
    fn test_move_creates_destination_parent() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("file.txt");
        fs::write(&src, "x").unwrap();
        let dst = dir.path().join("deep").join("er").join("file.txt");

        FileOps::default().move_file_or_dir(&src, &dst).unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read_to_string(dst).unwrap(), "x");
    }

    #[test]
    fn test_move_missing_source_fails() {
        let dir = tempdir().unwrap();
        let err = FileOps::default()
            .move_file_or_dir(&dir.path().join("nope"), &dir.path().join("dst"))
            .unwrap_err();
        assert!(matches!(err, FileOpError::MissingSource(_)));
    }

    #[test]
    fn test_remove_recursive_tolerates_missing_path() {
        let dir = tempdir().unwrap();
        let ops = FileOps::default();
        ops.remove_recursive(&dir.path().join("absent")).unwrap();

        let tree = dir.path().join("tree");
        fs::create_dir_all(tree.join("a").join("b")).unwrap();
        fs::write(tree.join("a").join("b").join("f"), "1").unwrap();
        fs::write(tree.join("g"), "2").unwrap();
        ops.remove_recursive(&tree).unwrap();
        assert!(!tree.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_remove_recursive_does_not_follow_links() {
        let dir = tempdir().unwrap();
        let keep = dir.path().join("keep");
        fs::create_dir_all(&keep).unwrap();
        fs::write(keep.join("data"), "precious").unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&keep, &link).unwrap();

        FileOps::default().remove_recursive(&link).unwrap();
        assert!(!link.exists());
        assert!(keep.join("data").exists());
    }

    #[test]
    fn test_expand_wildcard() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("INSTALL");
        fs::create_dir_all(&base).unwrap();
        fs::write(base.join("b.dll"), "").unwrap();
        fs::write(base.join("a.dll"), "").unwrap();
        fs::write(base.join("readme.txt"), "").unwrap();

        let found = expand_wildcard(&base.join("*.dll")).unwrap();
        assert_eq!(found, vec![base.join("a.dll"), base.join("b.dll")]);
        assert_eq!(expand_wildcard(&base.join("*")).unwrap().len(), 3);
        assert!(expand_wildcard(&dir.path().join("missing").join("*"))
            .unwrap()
            .is_empty());
    }
}
