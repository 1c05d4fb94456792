use clap::Parser;
use restbridge_server::{Seed, Store};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "restbridge-server",
    about = "In-memory REST API for exercising restbridge providers"
)]
struct Cli {
    /// Port to listen on.
    #[arg(long, default_value_t = 8322)]
    port: u16,

    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// JSON file mapping collection paths to the objects they start with.
    #[arg(long)]
    seed: Option<PathBuf>,
}

fn load_seed(path: &Path) -> Result<Seed, Box<dyn std::error::Error>> {
    let content = std::fs::read(path)?;
    Ok(serde_json::from_slice(&content)?)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let store = match &cli.seed {
        Some(path) => match load_seed(path) {
            Ok(seed) => {
                info!("seeded from {}", path.display());
                Store::with_seed(seed)
            }
            Err(e) => {
                error!("failed to load seed {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => Store::new(),
    };

    let addr = format!("{}:{}", cli.bind, cli.port);
    info!("starting restbridge-server on {addr}");
    if let Err(e) = restbridge_server::run_server(&store, &addr) {
        error!("server failed: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
