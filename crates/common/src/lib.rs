//! Common utilities shared across Token Gateway crates.

#![warn(clippy::pedantic)]

/// Module for JWT utilities (size limits, header parsing, iat validation)
pub mod jwt;
