//! Per-run variable context used for templating step paths.

use crate::error::{Error, Result};
use regex::{Captures, Regex};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const APP_PATH: &str = "appPath";
pub const APP_FOLDER: &str = "appFolder";
pub const BASE_NAME: &str = "baseName";
pub const DOWNLOADED_FILE: &str = "downloadedFile";
pub const VERSION: &str = "version";
pub const FINAL_DIR: &str = "finalDir";
pub const TEMP_DIR: &str = "tempDir";

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| {
        Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)|\{([A-Za-z_][A-Za-z0-9_]*)\}")
            .expect("token regex is valid")
    })
}

/// Insertion-ordered string map owned by a single pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variables {
    entries: Vec<(String, String)>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_app(app_path: &Path, app_folder: &str, base_name: &str) -> Self {
        let mut vars = Self::new();
        vars.set(APP_PATH, app_path.to_string_lossy());
        vars.set(APP_FOLDER, app_folder);
        vars.set(BASE_NAME, base_name);
        vars
    }

    /// Sets `key`, keeping its original position if it already exists.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn version(&self) -> Option<&str> {
        self.get(VERSION).filter(|v| !v.is_empty())
    }

    pub fn set_version(&mut self, version: &str) {
        self.set(VERSION, version);
    }

    pub fn app_folder(&self) -> Option<&str> {
        self.get(APP_FOLDER)
    }

    pub fn base_name(&self) -> Option<&str> {
        self.get(BASE_NAME)
    }

    pub fn app_path(&self) -> Option<PathBuf> {
        self.path(APP_PATH)
    }

    pub fn downloaded_file(&self) -> Option<PathBuf> {
        self.path(DOWNLOADED_FILE)
    }

    pub fn set_downloaded_file(&mut self, path: &Path) {
        self.set(DOWNLOADED_FILE, path.to_string_lossy());
    }

    pub fn final_dir(&self) -> Option<PathBuf> {
        self.path(FINAL_DIR)
    }

    pub fn set_final_dir(&mut self, path: &Path) {
        self.set(FINAL_DIR, path.to_string_lossy());
    }

    pub fn temp_dir(&self) -> Option<PathBuf> {
        self.path(TEMP_DIR)
    }

    pub fn set_temp_dir(&mut self, path: &Path) {
        self.set(TEMP_DIR, path.to_string_lossy());
    }

    /// Like [`Variables::get`] but a missing or empty value is an error.
    pub fn require(&self, key: &'static str) -> Result<&str> {
        self.get(key)
            .filter(|v| !v.is_empty())
            .ok_or(Error::MissingVariable(key))
    }

    pub fn require_path(&self, key: &'static str) -> Result<PathBuf> {
        self.require(key).map(PathBuf::from)
    }

    /// Replaces `$name` and `{name}` tokens. Unknown names stay verbatim.
    pub fn substitute(&self, raw: &str) -> String {
        token_regex()
            .replace_all(raw, |caps: &Captures| {
                let name = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map_or("", |m| m.as_str());
                match self.get(name) {
                    Some(value) => value.to_string(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    fn path(&self, key: &str) -> Option<PathBuf> {
        self.get(key).filter(|v| !v.is_empty()).map(PathBuf::from)
    }
}
