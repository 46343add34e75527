//! Service layer for the Research Analyst service.
//!
//! # Components
//!
//! - `user_resolver` - maps verified token claims to a persisted user

pub mod user_resolver;

pub use user_resolver::{PgUserResolver, SyncAction, UserResolver};
// Mock resolver for testing (exposed for integration tests)
#[allow(unused_imports)]
pub use user_resolver::mock::MockUserResolver;
