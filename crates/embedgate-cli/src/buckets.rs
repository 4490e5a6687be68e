//! # Buckets Subcommand
//!
//! One-shot pruning of stale rate-limit buckets, for deployments that run
//! housekeeping from cron instead of the gateway's background task.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use embedgate_api::store::{prune_stale, BucketStore, PgBucketStore};
use embedgate_core::{Clock, FixedWindow, SystemClock};

/// Arguments for the `embedgate buckets` subcommand.
#[derive(Args, Debug)]
pub struct BucketsArgs {
    #[command(subcommand)]
    pub command: BucketsCommand,
}

/// Bucket subcommands.
#[derive(Subcommand, Debug)]
pub enum BucketsCommand {
    /// Delete buckets from windows before the current one.
    Prune {
        #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
        database_url: String,
        /// Window size the gateway runs with.
        #[arg(long, env = "EMBEDGATE_RATE_WINDOW_SECS", default_value_t = FixedWindow::DEFAULT_SECS)]
        window_secs: u64,
    },
}

/// Execute the buckets subcommand.
pub fn run_buckets(args: &BucketsArgs) -> Result<u8> {
    match &args.command {
        BucketsCommand::Prune {
            database_url,
            window_secs,
        } => {
            let removed = crate::block_on(async {
                let pool = embedgate_api::db::connect(database_url)
                    .await
                    .context("failed to connect to database")?;
                prune(&PgBucketStore::new(pool), FixedWindow::new(*window_secs), &SystemClock).await
            })??;
            println!("OK: pruned {removed} stale bucket(s)");
            Ok(0)
        }
    }
}

/// Prune `store` relative to `clock`.
pub async fn prune(store: &dyn BucketStore, window: FixedWindow, clock: &dyn Clock) -> Result<u64> {
    prune_stale(store, window, clock)
        .await
        .context("bucket pruning failed")
}
