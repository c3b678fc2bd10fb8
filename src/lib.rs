//! Declarative update pipelines for portable applications.
//!
//! Each application folder under a software root holds one or more JSON
//! configs. A config's first step resolves and downloads the newest
//! artifact; the remaining steps extract and arrange files into a versioned
//! directory, and a link named after the config is repointed at it.

pub mod archive;
pub mod discovery;
pub mod download;
pub mod error;
pub mod fileops;
pub mod filter;
pub mod link;
pub mod paths;
pub mod pipeline;
pub mod resolve;
pub mod scanner;
pub mod settings;
pub mod types;
pub mod vars;

pub use error::{Error, Result};
pub use pipeline::{Pipeline, RunOutcome};
