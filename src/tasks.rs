//! Periodic feed refresh and change-detection sweep.

use crate::alerts::{AlertStore, ChangeDetector, CheckReport};
use crate::feed::FeedCache;
use crate::metrics::MetricName;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument};

/// One refresh-then-detect pass. At most one runs at a time; a pass that
/// finds another in flight is skipped rather than queued.
pub struct Sweeper {
    feed: Arc<FeedCache>,
    alerts: Arc<AlertStore>,
    detector: ChangeDetector,
    running: Mutex<()>,
}

impl Sweeper {
    pub fn new(feed: Arc<FeedCache>, alerts: Arc<AlertStore>, detector: ChangeDetector) -> Self {
        Self {
            feed,
            alerts,
            detector,
            running: Mutex::new(()),
        }
    }

    /// Returns `None` when a previous sweep was still running
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> Option<CheckReport> {
        let Ok(_running) = self.running.try_lock() else {
            counter!(MetricName::AlertSweepsSkipped.as_str()).increment(1);
            debug!("Previous sweep still running, skipping");
            return None;
        };
        counter!(MetricName::AlertSweeps.as_str()).increment(1);

        let data = self.feed.get_data(false).await;
        // re-read storage each pass: other processes may have added alerts,
        // and alerts dated before today are pruned here
        let alerts: Vec<_> = self
            .alerts
            .load()
            .await
            .into_iter()
            .filter(|a| a.enabled)
            .collect();
        if alerts.is_empty() {
            debug!("No enabled alerts");
            return Some(CheckReport::default());
        }
        Some(
            self.detector
                .check_for_new_events(&data.parties, &alerts)
                .await,
        )
    }
}

/// Run `sweeper` every `period` until `shutdown` flips to true. Each pass is
/// spawned so a slow pass does not delay the timer; overlapping ticks are
/// dropped by [`Sweeper::run_once`]. A pass already in flight at shutdown is
/// left to finish.
pub fn spawn_sweep(
    sweeper: Arc<Sweeper>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Alert sweep every {:?}", period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let sweeper = sweeper.clone();
                    tokio::spawn(async move {
                        if let Some(report) = sweeper.run_once().await {
                            debug!("Sweep checked {} alerts", report.alerts.len());
                        }
                    });
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Alert sweep stopped");
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::KeyValueStore;
    use crate::app::ManualClock;
    use crate::constants::alert_snapshot_key;
    use crate::feed::RefreshSchedule;
    use crate::infra::{InMemoryKvStore, NoopTokenRegistry, RecordingDispatcher, StaticSource};
    use crate::pipeline::processing::{RecordTransformer, VenueNormalizer};
    use chrono::{Duration as ChronoDuration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

    struct Rig {
        kv: Arc<InMemoryKvStore>,
        clock: Arc<ManualClock>,
        zone: FixedOffset,
        sweeper: Arc<Sweeper>,
    }

    fn rig() -> Rig {
        let zone = FixedOffset::east_opt(3600).unwrap();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 10, 31, 12, 0, 0).unwrap(),
        ));
        let kv = Arc::new(InMemoryKvStore::new());
        let feed = Arc::new(FeedCache::new(
            Arc::new(StaticSource::new(Vec::new())),
            RecordTransformer::new(VenueNormalizer::default()),
            RefreshSchedule::new(NaiveTime::from_hms_opt(10, 0, 0).unwrap(), zone),
            clock.clone(),
        ));
        let alerts = Arc::new(AlertStore::new(
            kv.clone(),
            Arc::new(NoopTokenRegistry),
            clock.clone(),
            zone,
        ));
        let detector = ChangeDetector::new(
            alerts.snapshots().clone(),
            Arc::new(RecordingDispatcher::new()),
        );
        Rig {
            kv,
            clock,
            zone,
            sweeper: Arc::new(Sweeper::new(feed, alerts, detector)),
        }
    }

    fn sweeper() -> Arc<Sweeper> {
        rig().sweeper
    }

    /// A second store over the same kv, as the CLI would open it
    fn other_process(rig: &Rig) -> AlertStore {
        AlertStore::new(
            rig.kv.clone(),
            Arc::new(NoopTokenRegistry),
            rig.clock.clone(),
            rig.zone,
        )
    }

    fn halloween() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 31).unwrap()
    }

    #[tokio::test]
    async fn sweep_checks_alerts_added_by_another_process() {
        let rig = rig();
        assert!(rig.sweeper.run_once().await.unwrap().alerts.is_empty());

        let alert = other_process(&rig).create(halloween(), None, &[]).await;

        let report = rig.sweeper.run_once().await.unwrap();
        assert_eq!(report.alerts.len(), 1);
        assert_eq!(report.alerts[0].0, alert.id);
    }

    #[tokio::test]
    async fn sweep_prunes_alerts_that_went_stale() {
        let rig = rig();
        let alert = other_process(&rig).create(halloween(), None, &[]).await;
        assert_eq!(rig.sweeper.run_once().await.unwrap().alerts.len(), 1);

        rig.clock.advance(ChronoDuration::days(5));
        let report = rig.sweeper.run_once().await.unwrap();

        assert!(report.alerts.is_empty());
        let snapshot = rig.kv.get(&alert_snapshot_key(&alert.id)).await.unwrap();
        assert_eq!(snapshot, None);
    }

    #[tokio::test]
    async fn overlapping_sweep_is_skipped() {
        let sweeper = sweeper();
        let guard = sweeper.running.lock().await;
        assert!(sweeper.run_once().await.is_none());
        drop(guard);
        assert!(sweeper.run_once().await.is_some());
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop() {
        let (tx, rx) = watch::channel(false);
        let handle = spawn_sweep(sweeper(), Duration::from_millis(10), rx);
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
