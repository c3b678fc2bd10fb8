//! Per-application pipeline config as read from `<app>/<name>.json`.

use crate::error::ConfigError;
use crate::filter::FilterOverride;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_dir_pattern: Option<String>,
    pub steps: Vec<Step>,
}

impl PipelineConfig {
    /// Decodes and validates a config. Unknown step shapes fail here.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: PipelineConfig = serde_json::from_slice(bytes)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_slice(&bytes)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let Some(first) = self.steps.first() else {
            return Err(ConfigError::NoSteps);
        };
        if !matches!(first, Step::Download(_)) {
            return Err(ConfigError::FirstStepNotDownload);
        }
        if let Some(index) = self
            .steps
            .iter()
            .skip(1)
            .position(|step| matches!(step, Step::Download(_)))
        {
            return Err(ConfigError::UnexpectedDownload { index: index + 1 });
        }
        Ok(())
    }

    /// The leading download step. Only meaningful on a validated config.
    pub fn download_step(&self) -> Option<&DownloadStep> {
        match self.steps.first() {
            Some(Step::Download(download)) => Some(download),
            _ => None,
        }
    }

    /// Everything after the download step.
    pub fn remaining_steps(&self) -> &[Step] {
        self.steps.get(1..).unwrap_or_default()
    }
}

/// One pipeline step, keyed by its single JSON property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Step {
    Download(DownloadStep),
    #[serde(rename = "extract7z")]
    Extract7z(ExtractSpec),
    ExtractZip(ExtractSpec),
    Move(MoveSpec),
    Remove(RemoveSpec),
    Copy(CopySpec),
    Sleep(SleepSpec),
}

impl Step {
    pub fn kind(&self) -> &'static str {
        match self {
            Step::Download(_) => "download",
            Step::Extract7z(_) => "extract7z",
            Step::ExtractZip(_) => "extractZip",
            Step::Move(_) => "move",
            Step::Remove(_) => "remove",
            Step::Copy(_) => "copy",
            Step::Sleep(_) => "sleep",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtractSpec {
    Path(String),
    Detailed {
        #[serde(alias = "path")]
        source: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<String>,
    },
}

impl ExtractSpec {
    pub fn source(&self) -> &str {
        match self {
            ExtractSpec::Path(source) | ExtractSpec::Detailed { source, .. } => source,
        }
    }

    pub fn target(&self) -> Option<&str> {
        match self {
            ExtractSpec::Path(_) => None,
            ExtractSpec::Detailed { to, .. } => to.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveSpec {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoveSpec {
    Path(String),
    Detailed { path: String },
}

impl RemoveSpec {
    pub fn path(&self) -> &str {
        match self {
            RemoveSpec::Path(path) | RemoveSpec::Detailed { path } => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopySpec {
    pub from: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SleepSpec {
    Seconds(i64),
    Detailed {
        #[serde(default)]
        seconds: i64,
    },
}

impl SleepSpec {
    pub fn seconds(&self) -> i64 {
        match self {
            SleepSpec::Seconds(seconds) | SleepSpec::Detailed { seconds } => *seconds,
        }
    }
}

/// Where the artifact comes from. A config may carry keys for several
/// sources; `redirectUrl` wins over `url`, which wins over `pageUrl`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadSource {
    GitHubApi {
        url: String,
        filter: Option<FilterOverride>,
    },
    HtmlPage {
        page_url: String,
        find_link: Option<FilterOverride>,
        version_from: Option<String>,
        version_pattern: Option<String>,
    },
    Redirect {
        redirect_url: String,
        version_pattern: Option<String>,
    },
}

impl DownloadSource {
    pub fn kind(&self) -> &'static str {
        match self {
            DownloadSource::GitHubApi { .. } => "github",
            DownloadSource::HtmlPage { .. } => "html",
            DownloadSource::Redirect { .. } => "redirect",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDownload", into = "RawDownload")]
pub struct DownloadStep {
    pub source: DownloadSource,
    pub filename_pattern: Option<String>,
}

/// The flat JSON shape of a download step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDownload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    redirect_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filter: Option<FilterOverride>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    page_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    find_link: Option<FilterOverride>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filename_pattern: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl TryFrom<RawDownload> for DownloadStep {
    type Error = ConfigError;

    fn try_from(raw: RawDownload) -> Result<Self, Self::Error> {
        let version_pattern = non_empty(raw.version_pattern);

        let source = if let Some(redirect_url) = non_empty(raw.redirect_url) {
            DownloadSource::Redirect {
                redirect_url,
                version_pattern,
            }
        } else if let Some(url) = non_empty(raw.url) {
            DownloadSource::GitHubApi {
                url,
                filter: raw.filter,
            }
        } else if let Some(page_url) = non_empty(raw.page_url) {
            DownloadSource::HtmlPage {
                page_url,
                find_link: raw.find_link,
                version_from: non_empty(raw.version_from),
                version_pattern,
            }
        } else {
            return Err(ConfigError::NoDownloadSource);
        };

        Ok(DownloadStep {
            source,
            filename_pattern: non_empty(raw.filename_pattern),
        })
    }
}

impl From<DownloadStep> for RawDownload {
    fn from(step: DownloadStep) -> Self {
        let mut raw = RawDownload {
            filename_pattern: step.filename_pattern,
            ..RawDownload::default()
        };
        match step.source {
            DownloadSource::GitHubApi { url, filter } => {
                raw.url = Some(url);
                raw.filter = filter;
            }
            DownloadSource::HtmlPage {
                page_url,
                find_link,
                version_from,
                version_pattern,
            } => {
                raw.page_url = Some(page_url);
                raw.find_link = find_link;
                raw.version_from = version_from;
                raw.version_pattern = version_pattern;
            }
            DownloadSource::Redirect {
                redirect_url,
                version_pattern,
            } => {
                raw.redirect_url = Some(redirect_url);
                raw.version_pattern = version_pattern;
            }
        }
        raw
    }
}
