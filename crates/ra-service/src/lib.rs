//! Research Analyst (RA) Service Library
//!
//! Authenticates API requests against a managed identity provider and keeps
//! a local `users` table in sync with it:
//!
//! - Key-set cache for the provider's public signing keys (`auth::jwks`)
//! - Token verification (`auth::jwt`)
//! - User resolution from verified claims (`services::user_resolver`)
//! - Request authentication composing the two (`auth::authenticator`)
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> auth/authenticator.rs
//!                                          -> auth/jwt.rs -> auth/jwks.rs
//!                                          -> services/*.rs -> repositories/*.rs
//! ```

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
