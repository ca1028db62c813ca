//! Metric names and Prometheus exporter setup.

use std::fmt;
use std::net::SocketAddr;
use tracing::{info, warn};

/// All metric names recorded by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Transformation
    RecordsTransformed,
    RecordsSkipped,
    VenuesResolved,

    // Upstream / cache
    UpstreamFetchSuccess,
    UpstreamFetchError,
    UpstreamFetchDuration,
    FeedCacheHits,
    FeedCacheFallbacks,

    // Alerts
    NotificationsEmitted,
    NotificationErrors,
    AlertSweeps,
    AlertSweepsSkipped,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::RecordsTransformed => "partyfinder_records_transformed_total",
            MetricName::RecordsSkipped => "partyfinder_records_skipped_total",
            MetricName::VenuesResolved => "partyfinder_venues_resolved",
            MetricName::UpstreamFetchSuccess => "partyfinder_upstream_fetch_success_total",
            MetricName::UpstreamFetchError => "partyfinder_upstream_fetch_error_total",
            MetricName::UpstreamFetchDuration => "partyfinder_upstream_fetch_duration_seconds",
            MetricName::FeedCacheHits => "partyfinder_feed_cache_hits_total",
            MetricName::FeedCacheFallbacks => "partyfinder_feed_cache_fallbacks_total",
            MetricName::NotificationsEmitted => "partyfinder_notifications_emitted_total",
            MetricName::NotificationErrors => "partyfinder_notification_errors_total",
            MetricName::AlertSweeps => "partyfinder_alert_sweeps_total",
            MetricName::AlertSweepsSkipped => "partyfinder_alert_sweeps_skipped_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install the Prometheus exporter with its own listener. A second install
/// (tests, repeated CLI runs in one process) only logs.
pub fn init_metrics(port: u16) {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => info!("Prometheus exporter listening on http://{}/metrics", addr),
        Err(e) => warn!("Prometheus exporter install failed (possibly already installed): {}", e),
    }
}
