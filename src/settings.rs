use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_DIR_NAME: &str = ".portup";
pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    #[serde(default)]
    pub software_root: Option<String>,
    #[serde(default = "default_seven_zip")]
    pub seven_zip: String,
    #[serde(default)]
    pub verify_tls: bool,
    #[serde(default)]
    pub keep_failed_workspace: bool,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_seven_zip() -> String {
    "7z".to_string()
}
fn default_http_timeout_secs() -> u64 {
    300
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            software_root: None,
            seven_zip: default_seven_zip(),
            verify_tls: false,
            keep_failed_workspace: false,
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl Settings {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    /// The software root: an explicit override wins over the settings value.
    pub fn root(&self, cli_root: Option<&Path>) -> Result<PathBuf> {
        if let Some(root) = cli_root {
            return Ok(root.to_path_buf());
        }
        self.software_root
            .as_deref()
            .filter(|root| !root.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| {
                anyhow::anyhow!("No software root configured. Set SOFTWARE_ROOT or pass --root")
            })
    }

    /// Applies environment overrides through `lookup` (normally `std::env::var`).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(root) = lookup("PORTUP_ROOT").or_else(|| lookup("SOFTWARE_ROOT")) {
            self.software_root = Some(root);
        }

        if let Some(seven_zip) = lookup("PORTUP_7Z") {
            self.seven_zip = seven_zip;
        }

        if let Some(verify) = lookup("PORTUP_VERIFY_TLS") {
            self.verify_tls = parse_bool(&verify);
        }

        if let Some(keep) = lookup("PORTUP_KEEP_FAILED") {
            self.keep_failed_workspace = parse_bool(&keep);
        }

        if let Some(timeout) = lookup("PORTUP_HTTP_TIMEOUT") {
            match timeout.parse::<u64>() {
                Ok(secs) => self.http_timeout_secs = secs,
                Err(_) => tracing::warn!("Ignoring invalid PORTUP_HTTP_TIMEOUT '{}'", timeout),
            }
        }
    }
}

fn parse_bool(value: &str) -> bool {
    value.to_lowercase() == "true" || value == "1"
}

pub fn get_user_config_dir() -> Result<PathBuf> {
    let path = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
        .join(CONFIG_DIR_NAME);
    Ok(path)
}

pub fn get_settings_file_path() -> Result<PathBuf> {
    let path = match std::env::var("PORTUP_CONFIG") {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => get_user_config_dir()?.join(CONFIG_FILE_NAME),
    };
    tracing::debug!("Settings file path: {}", path.display());
    Ok(path)
}

/// Settings file (if any) plus environment overrides.
pub fn load_settings() -> Result<Settings> {
    let mut settings = load_settings_from(&get_settings_file_path()?)?;
    settings.apply_overrides(|key| std::env::var(key).ok());
    Ok(settings)
}

pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read settings file at {}", path.display()))?;

    let settings: Settings = serde_json::from_str(&content)
        .with_context(|| format!("Could not parse settings file {} as JSON", path.display()))?;
    Ok(settings)
}
