//! # embedgate CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use embedgate_cli::audit::{run_audit, AuditArgs};
use embedgate_cli::buckets::{run_buckets, BucketsArgs};
use embedgate_cli::registry::{run_registry, RegistryArgs};
use embedgate_cli::ticket::{run_ticket, TicketArgs};

/// Embed Gate operator CLI
///
/// Mint test tickets, validate widget registrations, check origins, verify
/// the audit chain, and prune rate-limit buckets.
#[derive(Parser, Debug)]
#[command(name = "embedgate", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign or verify HMAC identity tickets.
    Ticket(TicketArgs),

    /// Validate widget seed files and test origins against them.
    Registry(RegistryArgs),

    /// Audit trail integrity checks.
    Audit(AuditArgs),

    /// Rate-limit bucket housekeeping.
    Buckets(BucketsArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Ticket(args) => run_ticket(&args),
        Commands::Registry(args) => run_registry(&args),
        Commands::Audit(args) => run_audit(&args),
        Commands::Buckets(args) => run_buckets(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
