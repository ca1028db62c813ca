use super::snapshot::SnapshotStore;
use crate::app::ports::NotificationDispatcher;
use crate::domain::{NotificationAlert, Party};
use crate::metrics::MetricName;
use chrono::NaiveDate;
use metrics::counter;
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// What one detection pass did for one alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum AlertOutcome {
    /// Snapshot was missing or empty; it was filled and nothing was reported
    Seeded { matching: usize },
    /// Snapshot diffed; `new_events` are the ids notified about
    Checked { matching: usize, new_events: Vec<String> },
    /// Snapshot could not be read; skipped to avoid false positives
    Skipped,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    pub alerts: Vec<(String, AlertOutcome)>,
}

impl CheckReport {
    pub fn notified_count(&self) -> usize {
        self.alerts
            .iter()
            .map(|(_, o)| match o {
                AlertOutcome::Checked { new_events, .. } => new_events.len(),
                _ => 0,
            })
            .sum()
    }
}

/// Diffs each alert's matching events against its snapshot and notifies
/// about the ones it has not seen before.
pub struct ChangeDetector {
    snapshots: SnapshotStore,
    dispatcher: Arc<dyn NotificationDispatcher>,
}

impl ChangeDetector {
    pub fn new(snapshots: SnapshotStore, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self {
            snapshots,
            dispatcher,
        }
    }

    /// One pass over every enabled alert. Alerts are handled independently:
    /// an event matching two alerts is reported once for each.
    #[instrument(skip_all, fields(events = current_events.len(), alerts = alerts.len()))]
    pub async fn check_for_new_events(
        &self,
        current_events: &[Party],
        alerts: &[NotificationAlert],
    ) -> CheckReport {
        let mut report = CheckReport::default();
        for alert in alerts.iter().filter(|a| a.enabled) {
            let outcome = self.check_alert(current_events, alert).await;
            report.alerts.push((alert.id.clone(), outcome));
        }
        let notified = report.notified_count();
        if notified > 0 {
            info!("Notified about {} new events", notified);
        }
        report
    }

    async fn check_alert(&self, current_events: &[Party], alert: &NotificationAlert) -> AlertOutcome {
        let matching = alert.matching(current_events);

        let known = match self.snapshots.load_ids(&alert.id).await {
            Ok(Some(ids)) if !ids.is_empty() => ids,
            Ok(_) => {
                // nothing recorded yet: remember what exists, report nothing
                if let Err(e) = self.snapshots.save(&alert.id, &matching).await {
                    warn!("Failed to seed snapshot for alert {}: {}", alert.id, e);
                }
                debug!("Seeded alert {} with {} events", alert.id, matching.len());
                return AlertOutcome::Seeded {
                    matching: matching.len(),
                };
            }
            Err(e) => {
                warn!("Failed to read snapshot for alert {}: {}", alert.id, e);
                return AlertOutcome::Skipped;
            }
        };

        let mut reported = HashSet::new();
        let mut new_events = Vec::new();
        for event in matching.iter().filter(|e| !known.contains(&e.id)) {
            if !reported.insert(event.id.as_str()) {
                continue;
            }
            self.notify(alert, event).await;
            new_events.push(event.id.clone());
        }

        if let Err(e) = self.snapshots.save(&alert.id, &matching).await {
            warn!("Failed to update snapshot for alert {}: {}", alert.id, e);
        }
        AlertOutcome::Checked {
            matching: matching.len(),
            new_events,
        }
    }

    async fn notify(&self, alert: &NotificationAlert, event: &Party) {
        let title = format!("🎉 {} just released tickets!", event.venue_name);
        let body = format!(
            "{} - {} - {}",
            event.venue_name,
            event.date.map(format_event_date).unwrap_or_default(),
            event.title
        );
        let payload = json!({ "eventId": event.id, "alertId": alert.id });
        match self.dispatcher.show(&title, &body, payload).await {
            Ok(()) => {
                counter!(MetricName::NotificationsEmitted.as_str()).increment(1);
            }
            Err(e) => {
                counter!(MetricName::NotificationErrors.as_str()).increment(1);
                warn!("Failed to dispatch notification for event {}: {}", event.id, e);
            }
        }
    }
}

/// "Friday, 31 October"
pub fn format_event_date(date: NaiveDate) -> String {
    date.format("%A, %-d %B").to_string()
}
