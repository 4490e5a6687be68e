//! # Registry Subcommand
//!
//! Offline checks against a widget seed file (the same YAML/JSON format the
//! gateway loads from `EMBEDGATE_WIDGETS_FILE`):
//!
//! - `validate`: every registration is well-formed, site keys and widget ids
//!   are unique, allow-lists are exact origins.
//! - `check-origin`: would this origin be admitted for this site key?
//! - `canonicalize`: print the canonical form of an origin.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use embedgate_api::registry::InMemoryRegistry;
use embedgate_core::{canonicalize, validate_origin};

/// Arguments for the `embedgate registry` subcommand.
#[derive(Args, Debug)]
pub struct RegistryArgs {
    #[command(subcommand)]
    pub command: RegistryCommand,
}

/// Registry subcommands.
#[derive(Subcommand, Debug)]
pub enum RegistryCommand {
    /// Validate a widget seed file.
    Validate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Check an origin against a widget's allow-list.
    CheckOrigin {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        site_key: String,
        #[arg(long)]
        origin: String,
    },

    /// Print the canonical form of an origin.
    Canonicalize {
        #[arg(value_name = "ORIGIN")]
        origin: String,
    },
}

/// Outcome of an origin check.
#[derive(Debug, PartialEq, Eq)]
pub enum OriginVerdict {
    Allowed { canonical: String },
    Denied { reason: &'static str },
    UnknownSiteKey,
}

/// Execute the registry subcommand.
pub fn run_registry(args: &RegistryArgs) -> Result<u8> {
    match &args.command {
        RegistryCommand::Validate { file } => {
            let registry = load(file)?;
            let active = registry.registrations().iter().filter(|r| r.active).count();
            println!(
                "OK: {} widget(s), {} active, in {}",
                registry.len(),
                active,
                file.display()
            );
            for reg in registry.registrations() {
                println!(
                    "  {} ({}) tenant={} origins={}{}",
                    reg.site_key,
                    reg.widget_id,
                    reg.tenant_id,
                    reg.allowed_origins.iter().collect::<Vec<_>>().join(","),
                    if reg.active { "" } else { " [inactive]" }
                );
            }
            Ok(0)
        }
        RegistryCommand::CheckOrigin {
            file,
            site_key,
            origin,
        } => match check_origin(&load(file)?, site_key, origin) {
            OriginVerdict::Allowed { canonical } => {
                println!("OK: {canonical} may embed {site_key}");
                Ok(0)
            }
            OriginVerdict::Denied { reason } => {
                println!("DENIED: {origin} for {site_key} ({reason})");
                Ok(1)
            }
            OriginVerdict::UnknownSiteKey => {
                println!("DENIED: no active widget with site key {site_key}");
                Ok(1)
            }
        },
        RegistryCommand::Canonicalize { origin } => match canonicalize(origin) {
            Ok(canonical) => {
                println!("{canonical}");
                Ok(0)
            }
            Err(e) => {
                println!("FAIL: {e}");
                Ok(1)
            }
        },
    }
}

fn load(file: &Path) -> Result<InMemoryRegistry> {
    InMemoryRegistry::load_file(file)
        .with_context(|| format!("invalid widget file: {}", file.display()))
}

/// Apply the gateway's origin rule for `site_key`.
pub fn check_origin(registry: &InMemoryRegistry, site_key: &str, origin: &str) -> OriginVerdict {
    let Some(reg) = registry
        .registrations()
        .into_iter()
        .find(|r| r.active && r.site_key.as_str() == site_key)
    else {
        return OriginVerdict::UnknownSiteKey;
    };
    match validate_origin(origin, &reg.allowed_origins) {
        Ok(canonical) => OriginVerdict::Allowed {
            canonical: canonical.to_string(),
        },
        Err(e) => OriginVerdict::Denied { reason: e.reason() },
    }
}
