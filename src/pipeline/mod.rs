//! One update run for one application config
//!
//! resolve → compute target → (skip | prepare workspace → fetch → steps →
//! link) → clean up.

pub mod steps;

use crate::archive::ArchiveExtractor;
use crate::discovery::AppConfigSource;
use crate::download::{HttpFetcher, HttpOptions};
use crate::error::{ConfigError, Error, Result};
use crate::fileops::FileOps;
use crate::link::{LinkManager, LinkPrimitive, PlatformLinks};
use crate::resolve::{apply_filename_pattern, file_name_from_url, AssetResolver, ResolvedAsset};
use crate::scanner::{self, TEMP_DIR_PREFIX};
use crate::settings::Settings;
use crate::types::{DownloadStep, PipelineConfig};
use crate::vars::{Variables, APP_PATH, BASE_NAME, DOWNLOADED_FILE, VERSION};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub use steps::StepExecutor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// A new version was installed and the link now points at it.
    Updated { version: String, final_dir: PathBuf },
    /// The resolved version is already present; nothing was changed.
    AlreadyInstalled { version: String, final_dir: PathBuf },
}

/// The line printed for every run that installed something.
pub fn updated_line(app_folder: &str, base_name: &str, version: &str) -> String {
    format!("UPDATED - {}/{} - {}", app_folder, base_name, version)
}

#[derive(Debug, Clone)]
pub struct Pipeline<L = PlatformLinks> {
    resolver: AssetResolver,
    executor: StepExecutor,
    links: LinkManager<L>,
    file_ops: FileOps,
    keep_failed_workspace: bool,
}

impl Pipeline<PlatformLinks> {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let fetcher = HttpFetcher::new(&HttpOptions {
            verify_tls: settings.verify_tls,
            timeout: settings.http_timeout(),
        })?;
        let file_ops = FileOps::default();
        let extractor = ArchiveExtractor::new(&settings.seven_zip, file_ops);

        Ok(Self::new(
            AssetResolver::new(fetcher),
            StepExecutor::new(extractor, file_ops),
            LinkManager::default(),
            file_ops,
        )
        .keep_failed_workspace(settings.keep_failed_workspace))
    }
}

impl<L: LinkPrimitive> Pipeline<L> {
    pub fn new(
        resolver: AssetResolver,
        executor: StepExecutor,
        links: LinkManager<L>,
        file_ops: FileOps,
    ) -> Self {
        Self {
            resolver,
            executor,
            links,
            file_ops,
            keep_failed_workspace: false,
        }
    }

    pub fn keep_failed_workspace(mut self, keep: bool) -> Self {
        self.keep_failed_workspace = keep;
        self
    }

    /// Repairs the link, loads the config and runs it.
    pub async fn run_app(&self, app: &AppConfigSource) -> Result<RunOutcome> {
        if let Err(e) = self.links.restore_missing_link(&app.app_path, &app.base_name) {
            tracing::warn!("Could not restore link {}: {}", app.base_name, e);
        }

        let config = PipelineConfig::load(&app.config_path)?;
        let vars = Variables::for_app(&app.app_path, &app.folder, &app.base_name);
        self.run(&config, vars).await
    }

    pub async fn run(&self, config: &PipelineConfig, mut vars: Variables) -> Result<RunOutcome> {
        config.validate()?;
        let download = config
            .download_step()
            .ok_or(ConfigError::FirstStepNotDownload)?;
        let app_path = vars.require_path(APP_PATH)?;
        let base_name = vars.require(BASE_NAME)?.to_string();

        let asset = self
            .resolver
            .resolve(&download.source)
            .await
            .map_err(|e| step_error(0, e.into()))?;
        if asset.version.trim().is_empty() {
            return Err(Error::MissingVariable(VERSION));
        }
        vars.set_version(&asset.version);

        let dir_name = match &config.final_dir_pattern {
            Some(pattern) => vars.substitute(pattern),
            None => asset.version.clone(),
        };
        let final_dir = app_path.join(&dir_name);
        if final_dir.exists() || scanner::is_installed(&app_path, &dir_name) {
            tracing::info!("{} is already installed", dir_name);
            return Ok(RunOutcome::AlreadyInstalled {
                version: asset.version,
                final_dir,
            });
        }

        fs::create_dir_all(&final_dir).map_err(|source| Error::Io {
            path: final_dir.clone(),
            source,
        })?;
        let workspace = tempfile::Builder::new()
            .prefix(TEMP_DIR_PREFIX)
            .tempdir_in(&app_path)
            .map_err(|source| Error::Io {
                path: app_path.clone(),
                source,
            });
        let workspace = match workspace {
            Ok(workspace) => workspace,
            Err(e) => {
                self.discard(&final_dir, None);
                return Err(e);
            }
        };
        vars.set_final_dir(&final_dir);
        vars.set_temp_dir(workspace.path());

        let result = self
            .install(download, &asset, config, workspace.path(), &mut vars)
            .await
            .and_then(|()| {
                self.links
                    .create_link(&final_dir, &app_path.join(&base_name), &base_name)
                    .map_err(Error::from)
            });

        match result {
            Ok(()) => {
                if let Err(e) = workspace.close() {
                    tracing::warn!("Could not remove temporary directory: {}", e);
                }
                Ok(RunOutcome::Updated {
                    version: asset.version,
                    final_dir,
                })
            }
            Err(e) => {
                self.discard(&final_dir, Some(workspace));
                Err(e)
            }
        }
    }

    /// Fetches the artifact into the workspace and runs the remaining steps.
    async fn install(
        &self,
        download: &DownloadStep,
        asset: &ResolvedAsset,
        config: &PipelineConfig,
        workspace: &Path,
        vars: &mut Variables,
    ) -> Result<()> {
        let downloaded = self
            .fetch(download, asset, workspace)
            .await
            .map_err(|e| step_error(0, e))?;
        vars.set_downloaded_file(&downloaded);
        vars.require(DOWNLOADED_FILE)?;
        vars.require(VERSION)?;

        for (offset, step) in config.remaining_steps().iter().enumerate() {
            self.executor.execute(offset + 1, step, vars).await?;
        }
        Ok(())
    }

    async fn fetch(
        &self,
        download: &DownloadStep,
        asset: &ResolvedAsset,
        workspace: &Path,
    ) -> Result<PathBuf> {
        let file_name = file_name_from_url(&asset.url);
        let mut dest = workspace.join(&file_name);
        self.resolver.fetcher().download(&asset.url, &dest).await?;

        if let Some(pattern) = &download.filename_pattern {
            let renamed = apply_filename_pattern(pattern, &asset.version, &file_name);
            if renamed != file_name {
                let target = workspace.join(&renamed);
                match self.file_ops.retrying_rename(&dest, &target) {
                    Ok(()) => dest = target,
                    Err(e) => tracing::warn!("Keeping original file name: {}", e),
                }
            }
        }
        Ok(dest)
    }

    fn discard(&self, final_dir: &Path, workspace: Option<TempDir>) {
        if self.keep_failed_workspace {
            if let Some(workspace) = workspace {
                #[allow(deprecated)]
                let kept = workspace.into_path();
                tracing::warn!("Keeping failed workspace {}", kept.display());
            }
            tracing::warn!("Keeping partial install {}", final_dir.display());
            return;
        }

        if let Err(e) = self.file_ops.remove_recursive(final_dir) {
            tracing::warn!("Could not remove {}: {}", final_dir.display(), e);
        }
        if let Some(workspace) = workspace {
            if let Err(e) = workspace.close() {
                tracing::warn!("Could not remove temporary directory: {}", e);
            }
        }
    }
}

fn step_error(index: usize, source: Error) -> Error {
    Error::Step {
        index,
        kind: "download",
        source: Box::new(source),
    }
}
