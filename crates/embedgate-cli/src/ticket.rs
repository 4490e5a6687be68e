//! # Ticket Subcommand
//!
//! Mint and check HMAC identity tickets with a widget secret. Embedders use
//! `sign` to produce fixtures for their own integration tests; operators use
//! `verify` to diagnose `invalid_ticket` and `ticket_expired` audit events.
//!
//! The secret is read from `--secret` or `EMBEDGATE_TICKET_SECRET` and never
//! echoed.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use embedgate_core::WidgetSecret;
use embedgate_crypto::{sign_ticket, TicketOutcome, TicketParts, TicketVerifier};

/// Arguments for the `embedgate ticket` subcommand.
#[derive(Args, Debug)]
pub struct TicketArgs {
    #[command(subcommand)]
    pub command: TicketCommand,
}

/// Ticket subcommands.
#[derive(Subcommand, Debug)]
pub enum TicketCommand {
    /// Sign `user_id:timestamp` and print the ticket query parameters.
    Sign {
        /// Widget secret.
        #[arg(long, env = "EMBEDGATE_TICKET_SECRET", hide_env_values = true)]
        secret: String,
        /// End-user identifier to bind.
        #[arg(long)]
        user_id: String,
        /// Issue time in epoch milliseconds (default: now).
        #[arg(long)]
        timestamp: Option<i64>,
    },

    /// Check a ticket exactly as the gateway would.
    Verify {
        /// Widget secret.
        #[arg(long, env = "EMBEDGATE_TICKET_SECRET", hide_env_values = true)]
        secret: String,
        #[arg(long)]
        user_id: String,
        /// Timestamp as sent on the request.
        #[arg(long)]
        timestamp: String,
        /// Hex-encoded signature.
        #[arg(long)]
        signature: String,
        /// Freshness window in seconds.
        #[arg(long, default_value_t = TicketVerifier::DEFAULT_MAX_AGE_SECS)]
        max_age_secs: u64,
        /// Evaluate at this epoch-millisecond instant instead of now.
        #[arg(long)]
        now: Option<i64>,
    },
}

/// Execute the ticket subcommand.
pub fn run_ticket(args: &TicketArgs) -> Result<u8> {
    match &args.command {
        TicketCommand::Sign {
            secret,
            user_id,
            timestamp,
        } => {
            let ts = timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp_millis());
            let ticket = mint(secret, user_id, ts)?;
            println!("{}", serde_json::to_string_pretty(&ticket)?);
            Ok(0)
        }
        TicketCommand::Verify {
            secret,
            user_id,
            timestamp,
            signature,
            max_age_secs,
            now,
        } => {
            let now = now.unwrap_or_else(|| chrono::Utc::now().timestamp_millis());
            let outcome = check(secret, user_id, timestamp, signature, *max_age_secs, now)?;
            match outcome {
                TicketOutcome::Verified { user_id } => {
                    println!("OK: ticket verified for user {user_id}");
                    Ok(0)
                }
                TicketOutcome::Expired { skew_ms } => {
                    println!(
                        "FAIL: ticket expired ({skew_ms} ms from now, window {} ms)",
                        max_age_secs.saturating_mul(1000)
                    );
                    Ok(1)
                }
                TicketOutcome::Invalid(e) => {
                    println!("FAIL: ticket invalid: {e}");
                    Ok(1)
                }
                TicketOutcome::Absent => {
                    println!("FAIL: no ticket fields supplied");
                    Ok(1)
                }
            }
        }
    }
}

/// Produce the ticket fields for `user_id` at `timestamp`.
pub fn mint(secret: &str, user_id: &str, timestamp: i64) -> Result<serde_json::Value> {
    let secret = WidgetSecret::new(secret).context("widget secret rejected")?;
    let signature = sign_ticket(&secret, user_id, timestamp).context("signing failed")?;
    Ok(serde_json::json!({
        "user_id": user_id,
        "timestamp": timestamp.to_string(),
        "signature": signature,
    }))
}

/// Verify ticket fields at `now_ms`.
pub fn check(
    secret: &str,
    user_id: &str,
    timestamp: &str,
    signature: &str,
    max_age_secs: u64,
    now_ms: i64,
) -> Result<TicketOutcome> {
    let secret = WidgetSecret::new(secret).context("widget secret rejected")?;
    let parts = TicketParts {
        user_id: Some(user_id),
        timestamp: Some(timestamp),
        signature: Some(signature),
    };
    Ok(TicketVerifier::new(max_age_secs).verify(&secret, parts, now_ms))
}
