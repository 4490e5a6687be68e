//! # Audit Subcommand
//!
//! Walks the `audit_events` hash chain in Postgres and reports every broken
//! link. A row edited in place shows up as `content_mismatch`; a deleted or
//! reordered row shows up as `previous_mismatch` on its successor.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use embedgate_api::audit::{verify_sink, AuditSink, PgAuditSink};
use embedgate_crypto::ChainIntegrity;

/// Arguments for the `embedgate audit` subcommand.
#[derive(Args, Debug)]
pub struct AuditArgs {
    #[command(subcommand)]
    pub command: AuditCommand,
}

/// Audit subcommands.
#[derive(Subcommand, Debug)]
pub enum AuditCommand {
    /// Verify the audit hash chain.
    Verify {
        #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
        database_url: String,
        /// Print the full integrity report as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Execute the audit subcommand.
pub fn run_audit(args: &AuditArgs) -> Result<u8> {
    match &args.command {
        AuditCommand::Verify { database_url, json } => {
            let integrity = crate::block_on(async {
                let pool = embedgate_api::db::connect(database_url)
                    .await
                    .context("failed to connect to database")?;
                let sink = PgAuditSink::new(pool);
                verify(&sink).await
            })??;
            report(&integrity, *json)
        }
    }
}

/// Verify any sink's chain.
pub async fn verify(sink: &dyn AuditSink) -> Result<ChainIntegrity> {
    verify_sink(sink).await.context("failed to read audit chain")
}

fn report(integrity: &ChainIntegrity, json: bool) -> Result<u8> {
    if json {
        println!("{}", serde_json::to_string_pretty(integrity)?);
    } else if integrity.chain_valid {
        println!(
            "OK: audit chain intact ({} events, head {})",
            integrity.total_events, integrity.head
        );
    } else {
        println!(
            "FAIL: {} broken link(s) in {} events",
            integrity.broken_links.len(),
            integrity.total_events
        );
        for link in &integrity.broken_links {
            println!("  sequence {}: {:?}", link.sequence, link.fault);
        }
    }
    Ok(if integrity.chain_valid { 0 } else { 1 })
}
