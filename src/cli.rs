use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub fn get_version() -> &'static str {
    const BASE_VERSION: &str = env!("CARGO_PKG_VERSION");

    // If there's a git tag at HEAD, use just the tag (release build)
    if let Some(tag) = option_env!("PORTUP_GIT_TAG") {
        return tag;
    }

    // Not on a tag - include commit hash and branch (dev build)
    let commit = option_env!("PORTUP_GIT_COMMIT").unwrap_or("unknown");
    let branch = option_env!("PORTUP_GIT_BRANCH").unwrap_or("unknown");

    // Leaked once at startup
    let version = format!("v{}-{} ({})", BASE_VERSION, commit, branch);
    Box::leak(version.into_boxed_str())
}

#[derive(Parser)]
#[command(name = "portup")]
#[command(about = "Keeps portable applications up to date from declarative JSON pipelines")]
#[command(version = get_version(), propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (use multiple times for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Reduce output to errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Stream debug progress (same as -vv)
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run every application pipeline under the software root
    #[command(
        after_help = "Examples:\n  portup update --root D:\\Software\n  portup update --app totalcmd\n  portup --debug update"
    )]
    Update {
        /// Software root (overrides SOFTWARE_ROOT and the settings file)
        #[arg(long)]
        root: Option<PathBuf>,
        /// Only process this application folder
        #[arg(long)]
        app: Option<String>,
    },

    /// Check every config under the software root without running it
    Validate {
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Print the decoded pipeline configs of one application
    Show {
        /// Application folder name
        folder: String,
        #[arg(long)]
        root: Option<PathBuf>,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },

    /// List applications with their installed versions and current link
    List {
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Show the current version
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}
