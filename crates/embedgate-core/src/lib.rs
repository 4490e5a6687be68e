#![warn(missing_docs)]

//! # embedgate-core: Foundational Types for the Widget Embedding Gateway
//!
//! Everything the admission path needs that does not touch the network or a
//! key: identifiers, the registry's view of a widget, origin
//! canonicalization, fixed-window arithmetic, and canonical bytes for the
//! audit chain. Only `serde`, `serde_json`, `serde_jcs`, `thiserror`,
//! `chrono`, `sha2`, `url`, and `zeroize` from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** A [`SiteKey`] is validated
//!    once at the boundary and cannot be confused with a [`TenantId`].
//!
//! 2. **Secrets have no outward path.** [`WidgetSecret`] is never
//!    `Serialize` and never `Debug`-printed; [`WidgetRegistration`] is not
//!    `Serialize` either, and [`WidgetConfig`] carries no secret field.
//!
//! 3. **Origins compare canonically.** [`validate_origin`] parses, rebuilds
//!    `scheme://host[:port]`, and matches exactly. No prefix tests, no
//!    wildcards.
//!
//! 4. **Time is injected.** Components take a [`Clock`]; tests drive a
//!    [`ManualClock`].

pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;
pub mod origin;
pub mod temporal;
pub mod widget;

pub use canonical::CanonicalBytes;
pub use digest::{sha256_digest, ContentDigest};
pub use error::{CanonicalizationError, EmbedGateError, OriginError, ValidationError};
pub use identity::{SiteKey, TenantId, WidgetId, WidgetSecret};
pub use origin::{canonicalize, validate_origin, AllowedOrigins, CanonicalOrigin};
pub use temporal::{Clock, FixedWindow, ManualClock, SystemClock, WindowSlot};
pub use widget::{WidgetConfig, WidgetRegistration};
