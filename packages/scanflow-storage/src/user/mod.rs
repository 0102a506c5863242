//! Users

pub mod identity;
pub mod search;

pub use identity::UserIdentity;
pub use search::{UserSearchEnricher, UserSearchRow, UserSummary};
