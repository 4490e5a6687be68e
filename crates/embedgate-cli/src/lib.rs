//! # embedgate-cli: Operator Tooling for the Widget Gateway
//!
//! Provides the `embedgate` command-line interface.
//!
//! ## Subcommands
//!
//! - `embedgate ticket` mints and checks identity tickets, for embedder
//!   integration work.
//! - `embedgate registry` validates widget seed files and tests origins
//!   against them.
//! - `embedgate audit` verifies the Postgres audit hash chain.
//! - `embedgate buckets` prunes stale rate-limit buckets.
//!
//! ```bash
//! embedgate ticket sign --user-id user-42
//! embedgate registry validate widgets.yaml
//! embedgate registry check-origin widgets.yaml --site-key pk_live_1 --origin https://shop.example
//! embedgate audit verify
//! ```

pub mod audit;
pub mod buckets;
pub mod registry;
pub mod ticket;

/// Run an async operator command on a fresh current-thread runtime.
pub(crate) fn block_on<F: std::future::Future>(future: F) -> anyhow::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}
