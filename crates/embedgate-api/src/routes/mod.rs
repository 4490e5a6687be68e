//! # API Route Modules
//!
//! - `bootstrap`: `GET /widget/bootstrap`, the public widget admission
//!   endpoint, and its CORS preflight.
//!
//! Health probes and `/metrics` are mounted directly in [`crate::app`].

pub mod bootstrap;
