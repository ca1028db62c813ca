//! Cached upstream feed and its read-only views.

pub mod cache;
pub mod query;
pub mod schedule;

pub use cache::{FeedCache, FeedStatus};
pub use schedule::RefreshSchedule;
