//! # embedgate-crypto: Cryptographic Primitives
//!
//! Provides the cryptographic building blocks for the embedding gateway:
//!
//! - **Identity tickets**: `HMAC-SHA256(secret, user_id ":" timestamp)`,
//!   hex-encoded, verified offline in constant time with a freshness window.
//! - **Audit chain digests**: `SHA-256(previous_hash ‖ canonical event)`, and
//!   a verifier that walks a chain and reports broken links.
//!
//! ## Crate Policy
//!
//! - Depends only on `embedgate-core` internally.
//! - Ticket verification never returns an error to the caller: every failure
//!   mode is a [`TicketOutcome`] variant, because a bad ticket downgrades the
//!   request to anonymous instead of denying it.
//! - No mocking of cryptographic operations in tests.

pub mod chain;
pub mod ticket;

pub use chain::{chain_hash, verify_chain, BrokenLink, ChainEntry, ChainIntegrity, LinkFault};
pub use ticket::{sign_ticket, TicketError, TicketOutcome, TicketParts, TicketVerifier};
