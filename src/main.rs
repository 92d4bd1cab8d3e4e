use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use olca_bridge::{Pipeline, PipelineConfig, RunSummary};

#[derive(Parser)]
#[command(author, version, about = "Exchange tables → openLCA JSON-LD archives")]
struct Cli {
    /// Log filter (overrides RUST_LOG), e.g. "debug" or "olca_bridge=debug"
    #[arg(long, global = true, env = "OLCA_BRIDGE_LOG")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build processes and write the JSON-LD archive
    Run {
        /// Pipeline config (JSON)
        config: PathBuf,
    },
    /// Load and validate the exchange table; nothing is written
    Validate {
        /// Pipeline config (JSON)
        config: PathBuf,
    },
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => tracing_subscriber::EnvFilter::new(level),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "olca_bridge=info".into()),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    match cli.command {
        Command::Run { config } => {
            println!("🏭 olca-bridge {} - building archive", olca_bridge::VERSION);
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            let pipeline = Pipeline::new(PipelineConfig::from_file(&config)?);
            let summary = pipeline.run()?;
            print_summary(&summary);
        }
        Command::Validate { config } => {
            println!("🔍 olca-bridge {} - validating", olca_bridge::VERSION);
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            let pipeline = Pipeline::new(PipelineConfig::from_file(&config)?);
            let summary = pipeline.validate()?;
            println!("✓ {} exchange rows valid", summary.exchanges);
            println!("✓ {} bridge processes needed", summary.bridges);
        }
    }

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✓ Exchanges:         {}", summary.exchanges);
    println!("✓ Processes:         {}", summary.processes);
    println!("✓ Bridge processes:  {}", summary.bridges);
    println!("✓ New flows:         {}", summary.new_flows);
    println!("✓ Entities written:  {}", summary.entities);
    if let Some(path) = &summary.archive {
        println!("📦 {}", path.display());
    }
}
