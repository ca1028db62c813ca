use crate::app::ports::{KeyValueStore, PushTokenRegistry};
use crate::constants::alert_tokens_key;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Token registrations kept in a key-value store, one list per alert
pub struct KvTokenRegistry {
    kv: Arc<dyn KeyValueStore>,
}

impl KvTokenRegistry {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub async fn tokens_for(&self, alert_id: &str) -> Result<Vec<String>> {
        match self.kv.get(&alert_tokens_key(alert_id)).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl PushTokenRegistry for KvTokenRegistry {
    async fn register(&self, alert_id: &str, token: &str) -> Result<()> {
        let mut tokens = self.tokens_for(alert_id).await?;
        if !tokens.iter().any(|t| t == token) {
            tokens.push(token.to_string());
        }
        self.kv
            .set(&alert_tokens_key(alert_id), &serde_json::to_string(&tokens)?)
            .await
    }

    async fn unregister_all(&self, alert_id: &str) -> Result<()> {
        self.kv.remove(&alert_tokens_key(alert_id)).await
    }
}

pub struct NoopTokenRegistry;

#[async_trait]
impl PushTokenRegistry for NoopTokenRegistry {
    async fn register(&self, _alert_id: &str, _token: &str) -> Result<()> {
        Ok(())
    }

    async fn unregister_all(&self, _alert_id: &str) -> Result<()> {
        Ok(())
    }
}
