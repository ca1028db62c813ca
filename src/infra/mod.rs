// Adapters behind the ports in app::ports

pub mod dispatch;
pub mod file_source;
pub mod http_client;
pub mod memory_kv;
pub mod push_tokens;
pub mod sqlite_kv;

pub use dispatch::{ExpoPushDispatcher, LogDispatcher, RecordingDispatcher, SentNotification};
pub use file_source::{FileJsonSource, StaticSource};
pub use http_client::{HttpJsonSource, UpcomingFilter};
pub use memory_kv::InMemoryKvStore;
pub use push_tokens::{KvTokenRegistry, NoopTokenRegistry};
pub use sqlite_kv::SqliteKvStore;
