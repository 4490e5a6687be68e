//! # Audit Hash Chain
//!
//! Each audit event is linked to its predecessor:
//!
//! ```text
//! event_hash = SHA-256(previous_hash_hex ‖ canonical_event_bytes)
//! ```
//!
//! The first event links to [`ContentDigest::ZERO`]. Rewriting, deleting, or
//! reordering any stored event breaks every later link, which
//! [`verify_chain`] reports.

use embedgate_core::{CanonicalBytes, ContentDigest};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Hash `event` onto the chain whose head is `previous`.
pub fn chain_hash(previous: &ContentDigest, event: &CanonicalBytes) -> ContentDigest {
    let mut hasher = Sha256::new();
    hasher.update(previous.to_hex().as_bytes());
    hasher.update(event.as_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    ContentDigest(out)
}

/// One stored link, as read back for verification.
#[derive(Debug, Clone)]
pub struct ChainEntry {
    /// Position in append order.
    pub sequence: i64,
    /// Hash recorded as the predecessor.
    pub previous_hash: String,
    /// Hash recorded for this event.
    pub event_hash: String,
    /// Event content, re-canonicalized from the stored columns.
    pub payload: CanonicalBytes,
}

/// Why a link failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkFault {
    /// `previous_hash` does not equal the prior entry's `event_hash`.
    PreviousMismatch,
    /// Recomputing the hash over the payload gives a different value.
    ContentMismatch,
}

/// A single broken link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokenLink {
    /// Sequence of the offending entry.
    pub sequence: i64,
    /// What went wrong.
    pub fault: LinkFault,
}

/// Outcome of walking a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainIntegrity {
    /// Entries examined.
    pub total_events: usize,
    /// Every link that failed.
    pub broken_links: Vec<BrokenLink>,
    /// True when no link failed.
    pub chain_valid: bool,
    /// `event_hash` of the last entry, or the zero hash for an empty chain.
    pub head: String,
}

/// Verify entries in append order, starting from the genesis hash.
pub fn verify_chain<'a, I>(entries: I) -> ChainIntegrity
where
    I: IntoIterator<Item = &'a ChainEntry>,
{
    let mut expected_prev = ContentDigest::ZERO.to_hex();
    let mut broken_links = Vec::new();
    let mut total_events = 0;

    for entry in entries {
        total_events += 1;
        if entry.previous_hash != expected_prev {
            broken_links.push(BrokenLink {
                sequence: entry.sequence,
                fault: LinkFault::PreviousMismatch,
            });
        }
        let recomputed = ContentDigest::from_hex(&entry.previous_hash)
            .map(|prev| chain_hash(&prev, &entry.payload).to_hex());
        if recomputed.as_deref() != Some(entry.event_hash.as_str()) {
            broken_links.push(BrokenLink {
                sequence: entry.sequence,
                fault: LinkFault::ContentMismatch,
            });
        }
        expected_prev = entry.event_hash.clone();
    }

    ChainIntegrity {
        total_events,
        chain_valid: broken_links.is_empty(),
        broken_links,
        head: expected_prev,
    }
}
