//! The per-application "current version" pointer.
//!
//! A directory junction on Windows and a symlink elsewhere, named after the
//! config's base name inside the application root.

use crate::error::LinkError;
use crate::scanner;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Filesystem primitives behind [`LinkManager`].
pub trait LinkPrimitive {
    fn create_dir_link(&self, target: &Path, link: &Path) -> io::Result<()>;

    fn read_link(&self, link: &Path) -> io::Result<PathBuf>;

    /// Removes a link, or an empty directory.
    fn remove_link(&self, path: &Path) -> io::Result<()>;

    /// Points `link` at `target`, replacing any existing link.
    fn replace_link(&self, target: &Path, link: &Path) -> io::Result<()> {
        if fs::symlink_metadata(link).is_ok() {
            self.remove_link(link)?;
        }
        self.create_dir_link(target, link)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformLinks;

#[cfg(unix)]
impl LinkPrimitive for PlatformLinks {
    fn create_dir_link(&self, target: &Path, link: &Path) -> io::Result<()> {
        std::os::unix::fs::symlink(target, link)
    }

    fn read_link(&self, link: &Path) -> io::Result<PathBuf> {
        fs::read_link(link)
    }

    fn remove_link(&self, path: &Path) -> io::Result<()> {
        if fs::symlink_metadata(path)?.file_type().is_symlink() {
            fs::remove_file(path)
        } else {
            fs::remove_dir(path)
        }
    }

    /// Builds the new link beside the old one and renames it into place, so
    /// the path never disappears.
    fn replace_link(&self, target: &Path, link: &Path) -> io::Result<()> {
        let name = link
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let staging = link.with_file_name(format!(".{}.link-{}", name, std::process::id()));
        if fs::symlink_metadata(&staging).is_ok() {
            fs::remove_file(&staging)?;
        }

        self.create_dir_link(target, &staging)?;
        fs::rename(&staging, link).map_err(|err| {
            let _ = fs::remove_file(&staging);
            err
        })
    }
}

#[cfg(windows)]
impl LinkPrimitive for PlatformLinks {
    fn create_dir_link(&self, target: &Path, link: &Path) -> io::Result<()> {
        let output = std::process::Command::new("cmd")
            .args(["/C", "mklink", "/J"])
            .arg(link)
            .arg(target)
            .output()?;
        if output.status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!(
                "mklink /J failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }

    fn read_link(&self, link: &Path) -> io::Result<PathBuf> {
        fs::read_link(link)
    }

    fn remove_link(&self, path: &Path) -> io::Result<()> {
        if fs::remove_dir(path).is_ok() || fs::symlink_metadata(path).is_err() {
            return Ok(());
        }
        std::process::Command::new("cmd")
            .args(["/C", "rmdir"])
            .arg(path)
            .status()?;
        if fs::symlink_metadata(path).is_ok() {
            return Err(io::Error::other(format!(
                "{} is still present after rmdir",
                path.display()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct LinkManager<L = PlatformLinks> {
    links: L,
}

impl<L: LinkPrimitive> LinkManager<L> {
    pub fn new(links: L) -> Self {
        Self { links }
    }

    /// Repoints `link_path` at `target`. Refuses to touch any path whose
    /// file name is not `expected_name` (case-insensitive).
    pub fn create_link(
        &self,
        target: &Path,
        link_path: &Path,
        expected_name: &str,
    ) -> Result<(), LinkError> {
        let name_matches = link_path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().eq_ignore_ascii_case(expected_name));
        if !name_matches {
            return Err(LinkError::NameMismatch {
                path: link_path.to_path_buf(),
                expected: expected_name.to_string(),
            });
        }

        // A real directory in the link's place must go first; it is only
        // removed when empty. A regular file is never replaced.
        if let Ok(metadata) = fs::symlink_metadata(link_path) {
            if metadata.is_file() {
                return Err(LinkError::Remove {
                    path: link_path.to_path_buf(),
                    source: io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        "a regular file occupies the link path",
                    ),
                });
            }
            if metadata.is_dir() && self.links.read_link(link_path).is_err() {
                self.links
                    .remove_link(link_path)
                    .map_err(|source| LinkError::Remove {
                        path: link_path.to_path_buf(),
                        source,
                    })?;
            }
        }

        self.links
            .replace_link(target, link_path)
            .map_err(|source| LinkError::Create {
                link: link_path.to_path_buf(),
                target: target.to_path_buf(),
                source,
            })?;
        tracing::info!("Linked {} -> {}", link_path.display(), target.display());
        Ok(())
    }

    /// Absolute target of the link, if it is one.
    pub fn current_target(&self, link_path: &Path) -> Option<PathBuf> {
        let target = self.links.read_link(link_path).ok()?;
        if target.is_absolute() {
            Some(target)
        } else {
            Some(link_path.parent()?.join(target))
        }
    }

    /// Creates the link to the lexicographically last installed version when
    /// it is missing or dangling. Returns the new target, if any.
    pub fn restore_missing_link(
        &self,
        app_path: &Path,
        link_name: &str,
    ) -> Result<Option<PathBuf>, LinkError> {
        let link_path = app_path.join(link_name);
        if link_path.is_dir() {
            return Ok(None);
        }

        let Some(latest) = scanner::local_versions(app_path).into_iter().next_back() else {
            return Ok(None);
        };
        let target = app_path.join(&latest);
        if !target.is_dir() {
            return Ok(None);
        }

        tracing::info!("Link {} is missing, pointing it at {}", link_name, latest);
        self.create_link(&target, &link_path, link_name)?;
        Ok(Some(target))
    }
}
