use super::schedule::RefreshSchedule;
use crate::app::ports::{Clock, KeyValueStore, UpstreamSource};
use crate::constants::FEED_LAST_GOOD_KEY;
use crate::domain::FeedData;
use crate::error::Result;
use crate::metrics::MetricName;
use crate::pipeline::processing::RecordTransformer;
use chrono::{DateTime, Duration, Utc};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredFeed {
    fetched_at: DateTime<Utc>,
    data: FeedData,
}

#[derive(Default)]
struct CacheState {
    cached: Option<(Arc<FeedData>, DateTime<Utc>)>,
    last_failure: Option<(DateTime<Utc>, String)>,
}

/// Feed health as reported to clients
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedStatus {
    pub has_data: bool,
    pub events_count: usize,
    pub venues_count: usize,
    pub last_update: Option<DateTime<Utc>>,
    pub cache_age_minutes: Option<i64>,
    /// The latest fetch attempt failed and older data is being served
    pub stale: bool,
    pub last_error: Option<String>,
}

/// Gates upstream polling behind a daily refresh boundary and shields
/// callers from upstream outages.
pub struct FeedCache {
    source: Arc<dyn UpstreamSource>,
    transformer: RecordTransformer,
    schedule: RefreshSchedule,
    clock: Arc<dyn Clock>,
    store: Option<Arc<dyn KeyValueStore>>,
    retry_interval: Duration,
    state: Mutex<CacheState>,
}

impl FeedCache {
    pub fn new(
        source: Arc<dyn UpstreamSource>,
        transformer: RecordTransformer,
        schedule: RefreshSchedule,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            transformer,
            schedule,
            clock,
            store: None,
            retry_interval: Duration::minutes(5),
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Keep the last good feed in `store` so a restart during an outage
    /// still has something to serve
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Minimum wait before a failed fetch is attempted again
    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    pub fn schedule(&self) -> &RefreshSchedule {
        &self.schedule
    }

    /// Current feed. Fetches on the first call, when `force_refresh` is set,
    /// or once per day after the refresh boundary; otherwise serves the
    /// cache. Never fails: an outage yields the last good data, or an empty
    /// feed when there is none.
    #[instrument(skip(self))]
    pub async fn get_data(&self, force_refresh: bool) -> Arc<FeedData> {
        // held across the fetch so concurrent callers share one fetch
        let mut state = self.state.lock().await;
        let now = self.clock.now();

        if !force_refresh && !self.is_due(&state, now) {
            if let Some((data, _)) = &state.cached {
                counter!(MetricName::FeedCacheHits.as_str()).increment(1);
                debug!("Serving cached feed");
                return data.clone();
            }
            // nothing cached and a recent attempt failed: wait out the retry window
            return self.fallback(&mut state).await;
        }

        match self.fetch_fresh().await {
            Ok(data) => {
                let data = Arc::new(data);
                state.cached = Some((data.clone(), now));
                state.last_failure = None;
                self.remember(&data, now).await;
                data
            }
            Err(e) => {
                warn!("Upstream fetch from {} failed: {}", self.source.name(), e);
                state.last_failure = Some((now, e.to_string()));
                counter!(MetricName::FeedCacheFallbacks.as_str()).increment(1);
                self.fallback(&mut state).await
            }
        }
    }

    /// Drop the in-memory feed and the persisted copy
    pub async fn clear(&self) -> Result<()> {
        *self.state.lock().await = CacheState::default();
        if let Some(store) = &self.store {
            store.remove(FEED_LAST_GOOD_KEY).await?;
        }
        info!("Feed cache cleared");
        Ok(())
    }

    pub async fn status(&self) -> FeedStatus {
        let state = self.state.lock().await;
        let now = self.clock.now();
        let (data, fetched_at) = match &state.cached {
            Some((data, at)) => (Some(data.clone()), Some(*at)),
            None => (None, None),
        };
        FeedStatus {
            has_data: data.as_ref().map_or(false, |d| !d.is_empty()),
            events_count: data.as_ref().map_or(0, |d| d.parties.len()),
            venues_count: data.as_ref().map_or(0, |d| d.venues.len()),
            last_update: fetched_at,
            cache_age_minutes: fetched_at.map(|at| (now - at).num_minutes()),
            stale: state.last_failure.is_some(),
            last_error: state.last_failure.as_ref().map(|(_, e)| e.clone()),
        }
    }

    /// Last good data: in memory, then persisted, then an empty feed
    async fn fallback(&self, state: &mut CacheState) -> Arc<FeedData> {
        if let Some((data, _)) = &state.cached {
            return data.clone();
        }
        if let Some(stored) = self.recall().await {
            info!("Serving last good feed from {}", stored.fetched_at);
            let data = Arc::new(stored.data);
            state.cached = Some((data.clone(), stored.fetched_at));
            return data;
        }
        Arc::new(FeedData::default())
    }

    fn is_due(&self, state: &CacheState, now: DateTime<Utc>) -> bool {
        let retry_ok = state
            .last_failure
            .as_ref()
            .map_or(true, |(at, _)| now - *at >= self.retry_interval);
        match &state.cached {
            None => retry_ok,
            Some((_, fetched_at)) => self.schedule.needs_refresh(*fetched_at, now) && retry_ok,
        }
    }

    async fn fetch_fresh(&self) -> Result<FeedData> {
        let source = self.source.name().to_string();
        let started = std::time::Instant::now();
        let fetched = self.source.fetch().await;
        histogram!(MetricName::UpstreamFetchDuration.as_str(), "source" => source.clone())
            .record(started.elapsed().as_secs_f64());

        let records = match fetched {
            Ok(records) => {
                counter!(MetricName::UpstreamFetchSuccess.as_str(), "source" => source).increment(1);
                records
            }
            Err(e) => {
                counter!(MetricName::UpstreamFetchError.as_str(), "source" => source).increment(1);
                return Err(e);
            }
        };
        info!("Fetched {} raw records", records.len());
        Ok(self.transformer.transform(&records))
    }

    async fn remember(&self, data: &FeedData, fetched_at: DateTime<Utc>) {
        let Some(store) = &self.store else { return };
        let stored = StoredFeed {
            fetched_at,
            data: data.clone(),
        };
        let written = match serde_json::to_string(&stored) {
            Ok(json) => store.set(FEED_LAST_GOOD_KEY, &json).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = written {
            warn!("Failed to persist last good feed: {}", e);
        }
    }

    async fn recall(&self) -> Option<StoredFeed> {
        let store = self.store.as_ref()?;
        match store.get(FEED_LAST_GOOD_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(stored) => Some(stored),
                Err(e) => {
                    warn!("Discarding unreadable last good feed: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read last good feed: {}", e);
                None
            }
        }
    }
}
