//! Common utilities shared across the gateway crates.

#![warn(clippy::pedantic)]

/// Module for JWT utilities (header inspection, size limits, issuer helpers)
pub mod jwt;
