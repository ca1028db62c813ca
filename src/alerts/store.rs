use super::id::AlertId;
use super::snapshot::SnapshotStore;
use crate::app::clock::today_in;
use crate::app::ports::{Clock, KeyValueStore, PushTokenRegistry};
use crate::constants::{ALERTS_KEY, PUSH_TOKEN_KEY};
use crate::domain::{NotificationAlert, Party};
use crate::error::{FeedError, Result};
use chrono::{FixedOffset, NaiveDate};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Alert subscriptions, persisted under one key.
///
/// The persisted list is the source of truth. Every mutation holds the
/// internal lock across read, modify and write, so concurrent callers are
/// serialized instead of losing each other's updates. When persistence fails
/// the in-memory copy keeps serving the current session.
pub struct AlertStore {
    kv: Arc<dyn KeyValueStore>,
    snapshots: SnapshotStore,
    tokens: Arc<dyn PushTokenRegistry>,
    clock: Arc<dyn Clock>,
    zone: FixedOffset,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    alerts: Vec<NotificationAlert>,
    // last write failed: memory is ahead of storage
    dirty: bool,
}

impl AlertStore {
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        tokens: Arc<dyn PushTokenRegistry>,
        clock: Arc<dyn Clock>,
        zone: FixedOffset,
    ) -> Self {
        Self {
            snapshots: SnapshotStore::new(kv.clone()),
            kv,
            tokens,
            clock,
            zone,
            state: Mutex::new(State::default()),
        }
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    /// Read the persisted alerts, discarding those dated before today and
    /// rewriting the stored list without them.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Vec<NotificationAlert> {
        let mut state = self.state.lock().await;
        let stored = if state.dirty {
            state.alerts.clone()
        } else {
            match self.read_persisted().await {
                Ok(stored) => stored,
                Err(e) => {
                    warn!("Failed to load alerts, keeping in-memory list: {}", e);
                    return state.alerts.clone();
                }
            }
        };

        let today = today_in(self.clock.as_ref(), self.zone);
        let (valid, stale): (Vec<_>, Vec<_>) = stored.into_iter().partition(|a| a.date >= today);
        let mut dirty = state.dirty;
        if !stale.is_empty() {
            info!("Pruning {} alerts dated before {}", stale.len(), today);
            dirty = !self.persist(&valid).await;
            for alert in &stale {
                self.release(&alert.id).await;
            }
        }
        state.alerts = valid;
        state.dirty = dirty;
        state.alerts.clone()
    }

    /// Create an alert and seed its snapshot with the events that already
    /// match it, so they are never reported as new.
    #[instrument(skip(self, current_events), fields(events = current_events.len()))]
    pub async fn create(
        &self,
        date: NaiveDate,
        venue_name: Option<&str>,
        current_events: &[Party],
    ) -> NotificationAlert {
        let venue_name = venue_name.map(str::trim).filter(|v| !v.is_empty());
        let mut state = self.state.lock().await;
        let mut alerts = self.current(&state).await;

        let now = self.clock.now();
        let mut millis = now.timestamp_millis();
        let id = loop {
            let candidate = AlertId::new(date, venue_name, millis).to_string();
            if !alerts.iter().any(|a| a.id == candidate) {
                break candidate;
            }
            millis += 1;
        };
        let alert = NotificationAlert {
            id,
            date,
            venue_name: venue_name.map(str::to_string),
            enabled: true,
            created_at: now,
        };

        alerts.push(alert.clone());
        state.dirty = !self.persist(&alerts).await;
        state.alerts = alerts;

        self.register_token(&alert.id).await;

        let matching = alert.matching(current_events);
        if let Err(e) = self.snapshots.save(&alert.id, &matching).await {
            warn!("Failed to seed snapshot for alert {}: {}", alert.id, e);
        }
        info!("Created alert {} seeded with {} events", alert.id, matching.len());
        alert
    }

    /// Delete an alert together with its snapshot and token registrations.
    /// Each of the three deletions is attempted regardless of the others.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: &str) -> bool {
        if AlertId::parse(id).is_none() {
            warn!("Refusing to remove malformed alert id {:?}", id);
            return false;
        }
        let mut state = self.state.lock().await;
        let mut alerts = self.current(&state).await;
        let before = alerts.len();
        alerts.retain(|a| a.id != id);
        let existed = alerts.len() != before;

        state.dirty = !self.persist(&alerts).await;
        state.alerts = alerts;
        self.release(id).await;
        info!("Removed alert {} (existed: {})", id, existed);
        existed
    }

    /// Flip `enabled`. The snapshot is left untouched.
    #[instrument(skip(self))]
    pub async fn toggle(&self, id: &str) -> Option<NotificationAlert> {
        if AlertId::parse(id).is_none() {
            warn!("Refusing to toggle malformed alert id {:?}", id);
            return None;
        }
        let mut state = self.state.lock().await;
        let mut alerts = self.current(&state).await;
        let toggled = alerts.iter_mut().find(|a| a.id == id).map(|a| {
            a.enabled = !a.enabled;
            a.clone()
        })?;
        state.dirty = !self.persist(&alerts).await;
        state.alerts = alerts;
        Some(toggled)
    }

    /// Enabled alerts for `date`
    pub async fn list_for_date(&self, date: NaiveDate) -> Vec<NotificationAlert> {
        self.refresh()
            .await
            .into_iter()
            .filter(|a| a.date == date && a.enabled)
            .collect()
    }

    pub async fn list(&self) -> Vec<NotificationAlert> {
        self.refresh().await
    }

    pub async fn enabled(&self) -> Vec<NotificationAlert> {
        self.refresh().await.into_iter().filter(|a| a.enabled).collect()
    }

    /// Remember this device's push token for future alert registrations
    pub async fn set_device_token(&self, token: &str) -> Result<()> {
        self.kv.set(PUSH_TOKEN_KEY, token).await
    }

    async fn read_persisted(&self) -> Result<Vec<NotificationAlert>> {
        match self.kv.get(ALERTS_KEY).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// Persisted list when readable and not behind memory, otherwise the
    /// in-memory one
    async fn current(&self, state: &State) -> Vec<NotificationAlert> {
        if state.dirty {
            return state.alerts.clone();
        }
        match self.read_persisted().await {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Failed to read alerts, using in-memory list: {}", e);
                state.alerts.clone()
            }
        }
    }

    /// Re-read the persisted list so writes from other processes sharing
    /// the store are visible
    async fn refresh(&self) -> Vec<NotificationAlert> {
        let mut state = self.state.lock().await;
        let alerts = self.current(&state).await;
        state.alerts = alerts.clone();
        alerts
    }

    async fn persist(&self, alerts: &[NotificationAlert]) -> bool {
        let written = match serde_json::to_string(alerts) {
            Ok(json) => self.kv.set(ALERTS_KEY, &json).await,
            Err(e) => Err(e.into()),
        };
        match written {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to persist {} alerts: {}", alerts.len(), e);
                false
            }
        }
    }

    async fn register_token(&self, alert_id: &str) {
        let token = match self.kv.get(PUSH_TOKEN_KEY).await {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!("No device token stored, alert {} relies on local notifications", alert_id);
                return;
            }
            Err(e) => {
                warn!("Failed to read device token: {}", e);
                return;
            }
        };
        match self.tokens.register(alert_id, &token).await {
            Ok(()) => {}
            Err(FeedError::PermissionDenied(_)) => {}
            Err(e) => warn!("Failed to register push token for alert {}: {}", alert_id, e),
        }
    }

    async fn release(&self, alert_id: &str) {
        if let Err(e) = self.snapshots.delete(alert_id).await {
            warn!("Failed to delete snapshot for alert {}: {}", alert_id, e);
        }
        match self.tokens.unregister_all(alert_id).await {
            Ok(()) => {}
            Err(FeedError::PermissionDenied(_)) => {}
            Err(e) => warn!("Failed to unregister push tokens for alert {}: {}", alert_id, e),
        }
    }
}
