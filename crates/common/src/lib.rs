//! Common utilities shared across Research Analyst components.

#![warn(clippy::pedantic)]

/// Module for JWT utilities (size limits, unverified header parsing, expiry checks)
pub mod jwt;
