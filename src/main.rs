mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, OutputFormat};
use console::style;
use portup::discovery::{discover_apps, AppConfigSource};
use portup::link::LinkManager;
use portup::pipeline::{updated_line, Pipeline, RunOutcome};
use portup::scanner;
use portup::settings::{load_settings, Settings};
use portup::types::PipelineConfig;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::Instrument;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli)?;

    match cli.command {
        Commands::Version => {
            println!("portup {}", cli::get_version());
        }

        Commands::Update { root, app } => {
            let settings = load_settings()?;
            let root = settings.root(root.as_deref())?;
            let failures = update_all(&settings, &root, app.as_deref()).await?;
            if failures > 0 {
                tracing::error!("{} application update(s) failed", failures);
                std::process::exit(1);
            }
        }

        Commands::Validate { root } => {
            let settings = load_settings()?;
            let root = settings.root(root.as_deref())?;
            if !validate_all(&root)? {
                std::process::exit(1);
            }
        }

        Commands::Show {
            folder,
            root,
            format,
        } => {
            let settings = load_settings()?;
            let root = settings.root(root.as_deref())?;
            show_app(&root, &folder, format)?;
        }

        Commands::List { root } => {
            let settings = load_settings()?;
            let root = settings.root(root.as_deref())?;
            list_apps(&root)?;
        }
    }

    Ok(())
}

fn setup_logging(cli: &Cli) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if cli.quiet {
        "error"
    } else if cli.debug || cli.verbose >= 2 {
        "debug"
    } else if cli.verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout is reserved for UPDATED lines and command output
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    Ok(())
}

fn discover(root: &Path) -> Result<Vec<AppConfigSource>> {
    discover_apps(root)
        .with_context(|| format!("Could not read software root {}", root.display()))
}

/// Runs every discovered config in order. Returns the number of failed runs.
async fn update_all(settings: &Settings, root: &Path, only_app: Option<&str>) -> Result<usize> {
    let apps: Vec<AppConfigSource> = discover(root)?
        .into_iter()
        .filter(|app| only_app.map_or(true, |only| app.folder.eq_ignore_ascii_case(only)))
        .collect();
    if apps.is_empty() {
        tracing::warn!("No application configs found under {}", root.display());
        return Ok(0);
    }

    let pipeline = Pipeline::from_settings(settings)?;
    let mut failures = 0;

    for app in &apps {
        let span = tracing::info_span!("app", folder = %app.folder, base = %app.base_name);
        match pipeline.run_app(app).instrument(span).await {
            Ok(RunOutcome::Updated { version, .. }) => {
                println!("{}", updated_line(&app.folder, &app.base_name, &version));
            }
            Ok(RunOutcome::AlreadyInstalled { version, .. }) => {
                tracing::info!(
                    "{}/{} is up to date ({})",
                    app.folder,
                    app.base_name,
                    version
                );
            }
            Err(e) => {
                failures += 1;
                tracing::error!("{}/{} failed: {}", app.folder, app.base_name, e);
            }
        }
    }

    Ok(failures)
}

fn validate_all(root: &Path) -> Result<bool> {
    let mut all_valid = true;
    for app in discover(root)? {
        let name = format!("{}/{}", app.folder, app.base_name);
        match PipelineConfig::load(&app.config_path) {
            Ok(config) => println!(
                "{} {} ({} steps)",
                style("OK").green(),
                name,
                config.steps.len()
            ),
            Err(e) => {
                all_valid = false;
                println!("{} {}: {}", style("ERROR").red(), name, e);
            }
        }
    }
    Ok(all_valid)
}

fn show_app(root: &Path, folder: &str, format: OutputFormat) -> Result<()> {
    let mut configs = BTreeMap::new();
    for app in discover(root)?
        .into_iter()
        .filter(|app| app.folder.eq_ignore_ascii_case(folder))
    {
        let config = PipelineConfig::load(&app.config_path)
            .with_context(|| format!("Invalid config {}", app.config_path.display()))?;
        configs.insert(app.base_name, config);
    }
    if configs.is_empty() {
        anyhow::bail!("No configs found for application '{}'", folder);
    }

    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&configs)?,
        OutputFormat::Yaml => serde_yaml::to_string(&configs)?,
    };
    println!("{}", rendered);
    Ok(())
}

fn list_apps(root: &Path) -> Result<()> {
    let links: LinkManager = LinkManager::default();
    let apps = discover(root)?;

    println!("--- Managed Applications ---");
    if apps.is_empty() {
        println!("  No application configs found.");
        return Ok(());
    }

    for app in &apps {
        let link = app.app_path.join(&app.base_name);
        let current = links
            .current_target(&link)
            .and_then(|target| target.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "-".to_string());
        let versions: Vec<String> = scanner::local_versions(&app.app_path).into_iter().collect();

        println!(
            "  - {} -> {}",
            style(format!("{}/{}", app.folder, app.base_name)).bold(),
            current
        );
        println!("    Versions: {}\n", versions.join(", "));
    }
    println!("----------------------------");
    Ok(())
}
