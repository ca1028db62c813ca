//! User alert subscriptions and new-event detection.

pub mod detector;
pub mod id;
pub mod snapshot;
pub mod store;

pub use detector::{AlertOutcome, ChangeDetector, CheckReport};
pub use id::AlertId;
pub use snapshot::SnapshotStore;
pub use store::AlertStore;
