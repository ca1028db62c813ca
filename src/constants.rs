/// Storage keys shared by the alert, snapshot, token and feed stores.
/// Every persisted entity lives under its own namespace in the key-value store.
pub const ALERTS_KEY: &str = "alerts";
pub const ALERT_SNAPSHOT_PREFIX: &str = "alert_snapshot:";
pub const ALERT_TOKENS_PREFIX: &str = "alert_tokens:";
pub const PUSH_TOKEN_KEY: &str = "push_token";
pub const FEED_LAST_GOOD_KEY: &str = "feed:last_good";

// Alert ids are `{date}_{venue or ALL_VENUES}_{millis}`
pub const ALL_VENUES: &str = "all";

// Fallbacks for venue fields the upstream leaves empty
pub const DEFAULT_VENUE_DESCRIPTION: &str = "Nightlife venue";
pub const DEFAULT_VENUE_ADDRESS: &str = "";
pub const DEFAULT_VENUE_IMAGE_URL: &str =
    "https://images.unsplash.com/photo-1514933651103-005eec06c04b?w=800&h=600&fit=crop&crop=center";
pub const DEFAULT_VENUE_WEBSITE: &str = "https://www.fourvenues.com";
pub const DEFAULT_VENUE_PHONE: &str = "";
pub const DEFAULT_CATEGORY_ID: &str = "1";
pub const DEFAULT_CATEGORY_NAME: &str = "Discoteca";
pub const DEFAULT_CATEGORY_ICON: &str = "musical-notes";

pub const DEFAULT_EVENT_TITLE: &str = "Untitled event";
pub const DEFAULT_TICKET_NAME: &str = "Entrada General";
pub const DEFAULT_TAG: &str = "Fiesta";

pub fn alert_snapshot_key(alert_id: &str) -> String {
    format!("{ALERT_SNAPSHOT_PREFIX}{alert_id}")
}

pub fn alert_tokens_key(alert_id: &str) -> String {
    format!("{ALERT_TOKENS_PREFIX}{alert_id}")
}
