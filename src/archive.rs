//! Archive extraction with single-root flattening.

use crate::error::ArchiveError;
use crate::fileops::FileOps;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// Anything the external 7-Zip executable opens (7z, self-extracting exe, cab).
    SevenZip,
    Zip,
}

impl ArchiveKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveKind::SevenZip => "7z",
            ArchiveKind::Zip => "zip",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveExtractor {
    seven_zip: PathBuf,
    file_ops: FileOps,
}

impl ArchiveExtractor {
    pub fn new(seven_zip: impl Into<PathBuf>, file_ops: FileOps) -> Self {
        Self {
            seven_zip: seven_zip.into(),
            file_ops,
        }
    }

    /// Extracts `archive` into `target` (created if needed), then flattens a
    /// lone wrapper directory.
    pub fn extract(
        &self,
        kind: ArchiveKind,
        archive: &Path,
        target: &Path,
    ) -> Result<(), ArchiveError> {
        if !archive.is_file() {
            return Err(ArchiveError::Missing(archive.to_path_buf()));
        }
        tracing::info!(
            "Extracting {} to {}",
            archive.display(),
            target.display()
        );

        fs::create_dir_all(target).map_err(|source| ArchiveError::Io {
            path: target.to_path_buf(),
            source,
        })?;

        match kind {
            ArchiveKind::Zip => extract_zip(archive, target)?,
            ArchiveKind::SevenZip => self.extract_with_7z(archive, target)?,
        }

        if self.flatten_single_root(target)? {
            tracing::debug!("Flattened single top-level directory in {}", target.display());
        }
        Ok(())
    }

    fn extract_with_7z(&self, archive: &Path, target: &Path) -> Result<(), ArchiveError> {
        let mut out_flag = OsString::from("-o");
        out_flag.push(target.as_os_str());

        tracing::debug!(
            "Running {} x -y {:?} {}",
            self.seven_zip.display(),
            out_flag,
            archive.display()
        );
        let output = Command::new(&self.seven_zip)
            .arg("x")
            .arg("-y")
            .arg(out_flag)
            .arg(archive)
            .output()
            .map_err(|e| ArchiveError::Open {
                path: archive.to_path_buf(),
                reason: format!("could not run {}: {}", self.seven_zip.display(), e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ArchiveError::Extract {
                path: archive.to_path_buf(),
                reason: format!("7-Zip exited with {}: {}", output.status, stderr.trim()),
            });
        }
        Ok(())
    }

    /// Moves the contents of a lone top-level directory up into `dir`.
    /// Returns whether anything was flattened. Any top-level file, or more
    /// than one directory, leaves `dir` untouched.
    pub fn flatten_single_root(&self, dir: &Path) -> Result<bool, ArchiveError> {
        let io_err = |source| ArchiveError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut children = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let file_type = entry.file_type().map_err(io_err)?;
            if !file_type.is_dir() {
                return Ok(false);
            }
            children.push(entry.path());
        }
        if children.len() != 1 {
            return Ok(false);
        }

        let wrapper = children.remove(0);
        let name = wrapper
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        // Park the wrapper first so an inner entry with the same name can move up.
        let parked = dir.join(format!(".flatten-{}", name));
        self.rename(&wrapper, &parked)?;

        for entry in fs::read_dir(&parked).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            self.rename(&entry.path(), &dir.join(entry.file_name()))?;
        }

        remove_empty_dir(&parked);
        Ok(true)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), ArchiveError> {
        self.file_ops
            .retrying_rename(from, to)
            .map_err(|e| ArchiveError::Extract {
                path: from.to_path_buf(),
                reason: e.to_string(),
            })
    }
}

fn extract_zip(archive_path: &Path, extract_dir: &Path) -> Result<(), ArchiveError> {
    let open_err = |reason: String| ArchiveError::Open {
        path: archive_path.to_path_buf(),
        reason,
    };
    let io_err = |path: &Path, source: io::Error| ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = fs::File::open(archive_path).map_err(|e| open_err(e.to_string()))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| open_err(e.to_string()))?;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(|e| ArchiveError::Extract {
            path: archive_path.to_path_buf(),
            reason: e.to_string(),
        })?;

        // Security check for path traversal
        let Some(relative) = file.enclosed_name().map(Path::to_path_buf) else {
            tracing::warn!("Skipping unsafe path in zip: {}", file.name());
            continue;
        };
        let outpath = extract_dir.join(relative);

        if file.is_dir() {
            fs::create_dir_all(&outpath).map_err(|e| io_err(&outpath, e))?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        let mut outfile = fs::File::create(&outpath).map_err(|e| io_err(&outpath, e))?;
        io::copy(&mut file, &mut outfile).map_err(|e| io_err(&outpath, e))?;

        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&outpath, fs::Permissions::from_mode(mode))
                .map_err(|e| io_err(&outpath, e))?;
        }
    }

    Ok(())
}

fn remove_empty_dir(dir: &Path) {
    if fs::remove_dir(dir).is_ok() || !dir.exists() {
        return;
    }
    #[cfg(windows)]
    {
        let _ = Command::new("cmd")
            .args(["/C", "rmdir"])
            .arg(dir)
            .status();
    }
    if dir.exists() {
        tracing::warn!("Could not remove {}", dir.display());
    }
}
