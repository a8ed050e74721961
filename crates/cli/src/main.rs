//! dualbook CLI - main entry point

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;

use dualbook_cli::{BookContext, commands};
use dualbook_observability::{LogConfig, LogFormat};
use dualbook_transfer::TransferToken;

#[derive(Parser)]
#[command(name = "dualbook")]
#[command(about = "Reconcile an exchange's books against a customer's", long_about = None)]
struct Cli {
    /// Log output format on stderr (json or pretty)
    #[arg(long, global = true, default_value = "json")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create both journals with the standard exchange/customer layout
    Init {
        #[arg(long)]
        config: PathBuf,
    },

    /// Compare the configured categories and print the discrepancies as JSON
    Compare {
        #[arg(long)]
        config: PathBuf,
    },

    /// Book a deposit on the exchange, optionally mirrored on the customer side
    Deposit {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        currency: String,
        #[arg(long, alias = "quan")]
        quantity: Decimal,
        /// Also book the customer's matching transaction
        #[arg(long)]
        mirror: bool,
        /// Idempotency token; reuse it to retry a partial deposit
        #[arg(long)]
        token: Option<String>,
    },

    /// Move value between exchange account types on both ledgers
    Transfer {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        currency: String,
        #[arg(long, alias = "quan")]
        quantity: Decimal,
        /// Source account type (e.g. 6 = funding)
        #[arg(long)]
        from: String,
        /// Destination account type (e.g. 1 = spot)
        #[arg(long)]
        to: String,
        /// Idempotency token; reuse it to retry a partial transfer
        #[arg(long)]
        token: Option<String>,
    },

    /// Run the deposit walkthrough on in-memory books and print each report
    Scenario,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    dualbook_observability::init_with(&LogConfig {
        format: cli.log_format,
        ..LogConfig::default()
    });

    match cli.command {
        Commands::Init { config } => {
            let ctx = BookContext::open(&config)?;
            commands::init(&ctx)?;
            tracing::info!(config = %config.display(), "journals initialized");
        }

        Commands::Compare { config } => {
            let ctx = BookContext::open(&config)?;
            let outcome = commands::compare(&ctx)?;
            print_json(&outcome.report)?;
            if outcome.should_fail() {
                return Ok(ExitCode::FAILURE);
            }
        }

        Commands::Deposit {
            config,
            currency,
            quantity,
            mirror,
            token,
        } => {
            let ctx = BookContext::open(&config)?;
            let token = token.map(TransferToken::new).transpose()?;
            let outcome = commands::deposit(&ctx, &currency, quantity, mirror, token)?;
            print_json(&outcome)?;
        }

        Commands::Transfer {
            config,
            currency,
            quantity,
            from,
            to,
            token,
        } => {
            let ctx = BookContext::open(&config)?;
            let token = token.map(TransferToken::new).transpose()?;
            let receipt = commands::transfer_between(&ctx, &currency, quantity, &from, &to, token)?;
            print_json(&receipt)?;
        }

        Commands::Scenario => {
            for step in commands::scenario()? {
                print_json(&step)?;
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
