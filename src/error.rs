//! Error types for every stage of an update run.
//!
//! Each concern has its own enum; [`Error`] aggregates them so a pipeline run
//! can bubble any failure up with `?`. All of these abort a single
//! application's run only.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    FileOp(#[from] FileOpError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error("variable '{0}' is not set")]
    MissingVariable(&'static str),

    #[error("step {index} ({kind}) failed: {source}")]
    Step {
        index: usize,
        kind: &'static str,
        #[source]
        source: Box<Error>,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("config has no steps")]
    NoSteps,

    #[error("first step must be a download step")]
    FirstStepNotDownload,

    #[error("download step {index} is not allowed; only the first step may download")]
    UnexpectedDownload { index: usize },

    #[error("download step needs one of 'redirectUrl', 'url' or 'pageUrl'")]
    NoDownloadSource,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("{url} did not redirect (HTTP {status}, no Location header)")]
    NoRedirect {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("could not write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("release data from {url} is not valid JSON: {source}")]
    InvalidJson {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("release data from {url} contains no assets")]
    NoAssets { url: String },

    #[error("nothing at {url} matches the filter")]
    NoMatch { url: String },

    #[error("invalid version pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive not found: {0}")]
    Missing(PathBuf),

    #[error("cannot open archive {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("cannot extract {path}: {reason}")]
    Extract { path: PathBuf, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum FileOpError {
    #[error("cannot rename {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot remove {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("source does not exist: {0}")]
    MissingSource(PathBuf),

    #[error("no entries match {0}")]
    NoMatch(String),

    #[error("invalid wildcard pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("refusing to touch {path}: link name must be '{expected}'")]
    NameMismatch { path: PathBuf, expected: String },

    #[error("cannot remove existing {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot create link {link} -> {target}: {source}")]
    Create {
        link: PathBuf,
        target: PathBuf,
        #[source]
        source: io::Error,
    },
}
