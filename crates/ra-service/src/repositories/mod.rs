//! Repository layer for the Research Analyst service.
//!
//! Provides database access following the Handler -> Service -> Repository
//! architecture. Queries are runtime-checked `sqlx::query` calls.

pub mod users;

pub use users::{unique_violation, UniqueViolation, UsersRepository};
