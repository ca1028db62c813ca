use crate::app::clock::today_in;
use crate::app::ports::{Clock, UpstreamSource};
use crate::domain::RawRecord;
use crate::error::{FeedError, Result};
use crate::pipeline::ingestion::{decode_records, retain_upcoming};
use async_trait::async_trait;
use chrono::FixedOffset;
use reqwest::header::CONTENT_TYPE;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Upcoming-only filtering applied after decoding, mirroring the document
/// store query (`date >= today`, ascending)
#[derive(Clone)]
pub struct UpcomingFilter {
    pub clock: Arc<dyn Clock>,
    pub zone: FixedOffset,
}

impl UpcomingFilter {
    pub fn apply(&self, records: Vec<RawRecord>) -> Vec<RawRecord> {
        retain_upcoming(records, today_in(self.clock.as_ref(), self.zone))
    }
}

/// GET a JSON array of raw event records
pub struct HttpJsonSource {
    client: reqwest::Client,
    url: String,
    upcoming: Option<UpcomingFilter>,
}

impl HttpJsonSource {
    pub fn new(url: impl Into<String>, timeout: Duration, upcoming: Option<UpcomingFilter>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            upcoming,
        })
    }
}

#[async_trait]
impl UpstreamSource for HttpJsonSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self) -> Result<Vec<RawRecord>> {
        let resp = self
            .client
            .get(&self.url)
            .header("Cache-Control", "no-cache")
            .send()
            .await?;
        let status = resp.status().as_u16();
        if !(200..=299).contains(&status) {
            return Err(FeedError::upstream(format!("GET {} returned status {}", self.url, status)));
        }
        let content_type = resp.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
        if !accepts_as_json(content_type) {
            return Err(FeedError::upstream(format!(
                "GET {} returned {} instead of JSON",
                self.url,
                content_type.unwrap_or_default()
            )));
        }
        let bytes = resp.bytes().await?;
        debug!("Fetched {} bytes from {}", bytes.len(), self.url);

        let records = decode_records(&bytes)?;
        Ok(match &self.upcoming {
            Some(filter) => filter.apply(records),
            None => records,
        })
    }
}

/// JSON, or a generic type some hosts serve JSON blobs as. An HTML error
/// page from a proxy is rejected here instead of failing in the decoder.
fn accepts_as_json(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return true;
    };
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime.is_empty()
        || mime == "application/json"
        || mime.ends_with("+json")
        || mime == "text/plain"
        || mime == "text/json"
        || mime == "application/octet-stream"
}
