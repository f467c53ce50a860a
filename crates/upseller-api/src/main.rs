use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use upseller_api::Server;
use upseller_core::{ConfigManager, LoggingConfig, UpsellerConfig};

#[derive(Parser, Debug)]
#[command(name = "upseller")]
#[command(author, version, about = "Upseller PRO: AI sales copy and market analysis", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Config file (default: ./.upseller.toml, then ~/.upseller/config.toml)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Interface to listen on
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Answer with scripted mock providers instead of calling any API
    #[arg(long)]
    mock: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Start the web server (default)")]
    Serve,

    #[command(about = "Write a config file with default values")]
    InitConfig {
        /// Target file (default: ~/.upseller/config.toml)
        #[arg(value_name = "FILE")]
        path: Option<PathBuf>,

        #[arg(short, long)]
        force: bool,
    },
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &logging.level;
        format!(
            "upseller_api={level},upseller_ai={level},upseller_core={level},tower_http={level}"
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format.as_str() {
        "json" => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        "compact" => registry
            .with(tracing_subscriber::fmt::layer().compact())
            .init(),
        _ => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .init(),
    }
}

/// Load the configuration while a scoped subscriber prints its diagnostics.
///
/// The configured subscriber can only be installed once the logging section
/// is known, so loading logs through a temporary one instead.
fn load_config(path: Option<&Path>) -> Result<ConfigManager> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("upseller_core=info"));
    let bootstrap = tracing_subscriber::fmt()
        .compact()
        .with_env_filter(filter)
        .finish();

    let manager = tracing::subscriber::with_default(bootstrap, || ConfigManager::load(path))?;
    Ok(manager)
}

fn apply_cli_overrides(mut config: UpsellerConfig, cli: &Cli) -> Result<UpsellerConfig> {
    if let Some(host) = &cli.host {
        config.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if cli.mock {
        config.use_mock = true;
    }
    ConfigManager::validate_config(&config)?;
    Ok(config)
}

fn init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => dirs::home_dir()
            .context("No home directory, pass a target file")?
            .join(".upseller")
            .join("config.toml"),
    };

    if path.exists() && !force {
        bail!(
            "{} already exists, use --force to overwrite",
            path.display()
        );
    }

    ConfigManager::create_default_config(&path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Command::InitConfig { path, force }) = &cli.command {
        return init_config(path.clone(), *force);
    }

    let manager = load_config(cli.config.as_deref())?;
    let config_path = manager.config_path().map(|p| p.display().to_string());
    let config = apply_cli_overrides(manager.into_config(), &cli)?;

    init_tracing(&config.logging);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config_file = config_path.as_deref().unwrap_or("(defaults)"),
        "Starting Upseller PRO"
    );

    Server::new(config).run().await
}
