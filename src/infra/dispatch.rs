use crate::app::ports::NotificationDispatcher;
use crate::error::{FeedError, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;

/// Writes notifications to the log; the default when no push provider is configured
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn show(&self, title: &str, body: &str, payload: serde_json::Value) -> Result<()> {
        info!(%payload, "🔔 {} | {}", title, body);
        Ok(())
    }
}

/// Hands notifications to the Expo push service for one device token
pub struct ExpoPushDispatcher {
    client: reqwest::Client,
    endpoint: String,
    device_token: String,
}

impl ExpoPushDispatcher {
    pub const DEFAULT_ENDPOINT: &'static str = "https://exp.host/--/api/v2/push/send";

    pub fn new(endpoint: impl Into<String>, device_token: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            device_token: device_token.into(),
        })
    }
}

#[async_trait]
impl NotificationDispatcher for ExpoPushDispatcher {
    async fn show(&self, title: &str, body: &str, payload: serde_json::Value) -> Result<()> {
        let message = json!({
            "to": self.device_token,
            "title": title,
            "body": body,
            "sound": "default",
            "priority": "high",
            "data": payload,
        });
        let resp = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(&message)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(FeedError::upstream(format!(
                "push provider responded with status {}",
                resp.status().as_u16()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentNotification {
    pub title: String,
    pub body: String,
    pub payload: serde_json::Value,
}

/// Keeps every notification in memory, for tests and dry runs
#[derive(Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<SentNotification>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Drain what was recorded so far
    pub fn take(&self) -> Vec<SentNotification> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn show(&self, title: &str, body: &str, payload: serde_json::Value) -> Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SentNotification {
                title: title.to_string(),
                body: body.to_string(),
                payload,
            });
        Ok(())
    }
}
