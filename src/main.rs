use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use salary_grading::api::{AppState, create_router};
use salary_grading::config::ConfigLoader;
use salary_grading::error::EngineError;
use salary_grading::hierarchy::HierarchyProvider;
use salary_grading::telemetry::{self, TelemetryError};
use thiserror::Error;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "salary-grading",
    about = "Model, calculate and apply salary grade scenarios",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Print the active position levels, highest authority first
    Levels(ConfigArgs),
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// Directory containing service.yaml and hierarchy.yaml
    #[arg(long, default_value = "./config/default")]
    config: PathBuf,
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[command(flatten)]
    config: ConfigArgs,
    /// Override the configured bind address (host:port)
    #[arg(long)]
    bind: Option<String>,
}

impl Default for ServeArgs {
    fn default() -> Self {
        Self {
            config: ConfigArgs {
                config: PathBuf::from("./config/default"),
            },
            bind: None,
        }
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("failed to serve on {address}: {source}")]
    Io {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Levels(args) => print_levels(args),
    }
}

async fn run_server(args: ServeArgs) -> Result<(), CliError> {
    let config = ConfigLoader::load(&args.config.config)?;
    telemetry::init(&config.service().log_level)?;

    let address = args
        .bind
        .unwrap_or_else(|| config.service().bind_address.clone());
    let systems = config.service().grading_systems.len();
    let app = create_router(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|source| CliError::Io {
            address: address.clone(),
            source,
        })?;

    info!(%address, grading_systems = systems, "salary grading service ready");

    axum::serve(listener, app)
        .await
        .map_err(|source| CliError::Io { address, source })
}

fn print_levels(args: ConfigArgs) -> Result<(), CliError> {
    let config = ConfigLoader::load(&args.config)?;
    for level in config.list_active_levels()? {
        println!("{:>3}  {}", level.level, level.name);
    }
    Ok(())
}
