use super::http_client::UpcomingFilter;
use crate::app::ports::UpstreamSource;
use crate::domain::RawRecord;
use crate::error::{FeedError, Result};
use crate::pipeline::ingestion::decode_records;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Mutex;

/// JSON blob on local disk, as written by the scraper
pub struct FileJsonSource {
    path: PathBuf,
    upcoming: Option<UpcomingFilter>,
}

impl FileJsonSource {
    pub fn new(path: impl Into<PathBuf>, upcoming: Option<UpcomingFilter>) -> Self {
        Self {
            path: path.into(),
            upcoming,
        }
    }
}

#[async_trait]
impl UpstreamSource for FileJsonSource {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch(&self) -> Result<Vec<RawRecord>> {
        let bytes = tokio::fs::read(&self.path).await?;
        let records = decode_records(&bytes)?;
        Ok(match &self.upcoming {
            Some(filter) => filter.apply(records),
            None => records,
        })
    }
}

/// Fixed records, swappable at runtime; `fail` makes the next fetches error.
/// Used by tests and the offline CLI paths.
#[derive(Default)]
pub struct StaticSource {
    state: Mutex<StaticState>,
}

#[derive(Default)]
struct StaticState {
    records: Vec<RawRecord>,
    failing: bool,
    fetches: usize,
}

impl StaticSource {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self {
            state: Mutex::new(StaticState {
                records,
                ..Default::default()
            }),
        }
    }

    pub fn set_records(&self, records: Vec<RawRecord>) {
        self.lock().records = records;
    }

    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Number of fetch attempts so far, failed ones included
    pub fn fetch_count(&self) -> usize {
        self.lock().fetches
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StaticState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl UpstreamSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self) -> Result<Vec<RawRecord>> {
        let mut state = self.lock();
        state.fetches += 1;
        if state.failing {
            return Err(FeedError::upstream("static source set to fail"));
        }
        Ok(state.records.clone())
    }
}
