use crate::app::ports::KeyValueStore;
use crate::constants::alert_snapshot_key;
use crate::domain::{EventFingerprint, Party};
use crate::error::Result;
use std::collections::HashSet;
use std::sync::Arc;

/// Per-alert record of which events matched its filter at the last check.
///
/// A missing key and a stored empty list both read as "nothing recorded":
/// the next check fills the snapshot without reporting anything.
#[derive(Clone)]
pub struct SnapshotStore {
    kv: Arc<dyn KeyValueStore>,
}

impl SnapshotStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub async fn load(&self, alert_id: &str) -> Result<Option<Vec<EventFingerprint>>> {
        match self.kv.get(&alert_snapshot_key(alert_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn load_ids(&self, alert_id: &str) -> Result<Option<HashSet<String>>> {
        Ok(self
            .load(alert_id)
            .await?
            .map(|events| events.into_iter().map(|e| e.id).collect()))
    }

    /// Replace the alert's snapshot with `events`
    pub async fn save(&self, alert_id: &str, events: &[&Party]) -> Result<()> {
        let fingerprints: Vec<EventFingerprint> = events.iter().map(|p| EventFingerprint::from(*p)).collect();
        self.kv
            .set(&alert_snapshot_key(alert_id), &serde_json::to_string(&fingerprints)?)
            .await
    }

    pub async fn delete(&self, alert_id: &str) -> Result<()> {
        self.kv.remove(&alert_snapshot_key(alert_id)).await
    }
}
