use crate::domain::RawRecord;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

// Local persistence
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

// Ingest-side ports
#[async_trait]
pub trait UpstreamSource: Send + Sync {
    /// Short name used in logs and metric labels
    fn name(&self) -> &str;

    /// Fetch the current raw event records. Only a payload that is not an
    /// array at the top level is an error; individual bad records are not.
    async fn fetch(&self) -> Result<Vec<RawRecord>>;
}

/// Fire-and-forget display of one notification
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn show(&self, title: &str, body: &str, payload: serde_json::Value) -> Result<()>;
}

/// Best-effort association of device tokens with alerts in a remote store.
/// Callers swallow every error coming out of here.
#[async_trait]
pub trait PushTokenRegistry: Send + Sync {
    async fn register(&self, alert_id: &str, token: &str) -> Result<()>;
    async fn unregister_all(&self, alert_id: &str) -> Result<()>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
