//! meemo-archive: command-line tool for meemo archive bundles.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::debug;

use meemo_service::logging::{self, LogConfig};
use meemo_service::inspect_bundle;

#[derive(Parser)]
#[command(name = "meemo-archive")]
#[command(author, version, about = "Inspect meemo archive bundles")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report what a bundle contains without importing it
    Inspect {
        /// Bundle file (tar or tar.gz)
        bundle: PathBuf,

        /// Print single-line JSON
        #[arg(long)]
        compact: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = logging::init(&LogConfig::from_env(), "meemo_service=info");

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { bundle, compact } => {
            debug!(bundle = %bundle.display(), "Inspecting bundle");
            let report = inspect_bundle(&bundle)
                .await
                .with_context(|| format!("failed to inspect {}", bundle.display()))?;

            let output = if compact {
                serde_json::to_string(&report)?
            } else {
                serde_json::to_string_pretty(&report)?
            };
            println!("{}", output);
        }
    }

    Ok(())
}
