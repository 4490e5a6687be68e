//! # Origin Canonicalization and Allow-List Checks
//!
//! Decides whether a caller-supplied origin string may embed a widget.
//!
//! ## Security Invariant
//!
//! Comparison is always between *canonical* origins (`scheme://host[:port]`)
//! reconstructed from a parsed URL, never between raw strings. A prefix test
//! would accept `https://evil.com/https://good.com` or
//! `https://good.com.evil.com`; an exact match on the parsed tuple does not.
//!
//! Wildcards are never expanded. An allow-list entry containing `*` fails
//! registration validation in [`AllowedOrigins::new`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{OriginError, ValidationError};

/// An origin in canonical `scheme://host[:port]` form.
///
/// Hosts are lowercased (and IDNA-encoded) and default ports are elided by
/// the URL parser, so `https://Good.com:443` canonicalizes to
/// `https://good.com`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "String")]
pub struct CanonicalOrigin(String);

impl CanonicalOrigin {
    /// Borrow the canonical form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<CanonicalOrigin> for String {
    fn from(value: CanonicalOrigin) -> Self {
        value.0
    }
}

impl std::fmt::Display for CanonicalOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of parsing a raw origin: the canonical tuple, plus whether the raw
/// value carried anything beyond it.
struct ParsedOrigin {
    canonical: CanonicalOrigin,
    extra: Option<&'static str>,
}

fn parse_origin(raw: &str) -> Result<ParsedOrigin, OriginError> {
    if raw.is_empty() || raw.trim() != raw {
        return Err(OriginError::Malformed);
    }
    let url = Url::parse(raw).map_err(|_| OriginError::Malformed)?;
    let origin = url.origin();
    if !origin.is_tuple() {
        return Err(OriginError::Malformed);
    }
    let canonical = CanonicalOrigin(origin.ascii_serialization());

    let extra = if !url.username().is_empty() || url.password().is_some() {
        Some("origin_has_credentials")
    } else if !matches!(url.path(), "" | "/") {
        Some("origin_has_path")
    } else if url.query().is_some() {
        Some("origin_has_query")
    } else if url.fragment().is_some() {
        Some("origin_has_fragment")
    } else {
        None
    };

    Ok(ParsedOrigin { canonical, extra })
}

/// Canonicalize a raw origin, discarding path, query, and fragment.
///
/// Fails with [`OriginError::Malformed`] when the input is not an absolute
/// URL with a host (e.g. `data:` or `file:` URLs, bare hostnames).
pub fn canonicalize(raw: &str) -> Result<CanonicalOrigin, OriginError> {
    parse_origin(raw).map(|p| p.canonical)
}

/// Set of exact origins a widget may be embedded from.
///
/// Construction validates every entry: it must already be in canonical form,
/// contain no wildcard, and carry no path, query, fragment, or credentials.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllowedOrigins(BTreeSet<String>);

impl AllowedOrigins {
    /// Validate and collect allow-list entries for `widget`.
    pub fn new<I, S>(widget: &str, entries: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = BTreeSet::new();
        for entry in entries {
            let entry = entry.into();
            validate_entry(widget, &entry)?;
            set.insert(entry);
        }
        Ok(Self(set))
    }

    /// Whether the canonical origin is listed, byte for byte.
    pub fn contains(&self, origin: &CanonicalOrigin) -> bool {
        self.0.contains(origin.as_str())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the allow-list is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate entries in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Re-run entry validation, e.g. after deserializing from a seed file.
    pub fn validate(&self, widget: &str) -> Result<(), ValidationError> {
        self.0.iter().try_for_each(|entry| validate_entry(widget, entry))
    }
}

fn validate_entry(widget: &str, entry: &str) -> Result<(), ValidationError> {
    let invalid = |reason| ValidationError::InvalidAllowListEntry {
        widget: widget.to_string(),
        entry: entry.to_string(),
        reason,
    };
    if entry.contains('*') {
        return Err(invalid("wildcards are not supported"));
    }
    let parsed = parse_origin(entry).map_err(|_| invalid("not an absolute URL with a host"))?;
    if parsed.extra.is_some() {
        return Err(invalid("must not carry a path, query, fragment, or credentials"));
    }
    if parsed.canonical.as_str() != entry {
        return Err(invalid("not in canonical scheme://host[:port] form"));
    }
    Ok(())
}

/// Check a caller-supplied origin against a widget's allow-list.
///
/// Returns the canonical origin on success. A raw value that parses but
/// carries a path, query, fragment, or credentials is not an origin and is
/// rejected as [`OriginError::NotAllowed`], as is any canonical origin not
/// present in `allowed`.
pub fn validate_origin(
    raw: &str,
    allowed: &AllowedOrigins,
) -> Result<CanonicalOrigin, OriginError> {
    let parsed = parse_origin(raw)?;
    if let Some(reason) = parsed.extra {
        return Err(OriginError::NotAllowed { reason });
    }
    if !allowed.contains(&parsed.canonical) {
        return Err(OriginError::NotAllowed {
            reason: "not_in_allow_list",
        });
    }
    Ok(parsed.canonical)
}
