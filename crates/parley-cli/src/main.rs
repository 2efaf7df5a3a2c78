//! Parley CLI - LLM price negotiations from the command line
//!
//! # Quick Start
//!
//! ```bash
//! # Keys come from the environment, a .env file, or --api-keys
//! export GROQ_API_KEY=...
//!
//! parley negotiate --scenario data/Bike.json --rules data/rules.json \
//!     --buyer neutral-concise-buyer --seller desperate-seller
//! parley negotiate ... --deceptive --hallucination-index
//! parley sessions --store data/Bike.json
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod display;

use commands::negotiate::{self, NegotiateArgs};
use commands::sessions;

/// Parley CLI - Buyer and seller agents negotiating a price
#[derive(Parser)]
#[command(name = "parley")]
#[command(author = "Parley Contributors")]
#[command(version)]
#[command(about = "Run and inspect LLM price negotiations", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Negotiate between a buyer and a seller and save the session
    Negotiate(NegotiateArgs),

    /// List the sessions in a store
    Sessions {
        /// Session store or scenario file
        #[arg(long)]
        store: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    print_banner();

    match cli.command {
        Commands::Negotiate(args) => negotiate::run_negotiation(args).await?,
        Commands::Sessions { store } => sessions::list_sessions(&store)?,
    }

    Ok(())
}

fn print_banner() {
    println!();
    println!("  {} {}", "parley".bright_cyan().bold(), env!("CARGO_PKG_VERSION").bright_black());
    println!("  {}", "buyer and seller agents at the table".bright_black());
}
