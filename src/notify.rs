//! Alert notification capability. Dispatch is fire-and-forget from the
//! ingestion path: a failed delivery is logged and never reaches the caller.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;
use std::time::Duration;
use tracing::info;

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Snapshot of the reading that crossed the alert threshold.
#[derive(Debug, Clone)]
pub struct AmmoniaAlert {
    pub ammonia_ppm: f64,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl AmmoniaAlert {
    pub fn body(&self) -> String {
        format!(
            "Ammonia level is {} ppm at {}.\nTemperature: {:?} C\nHumidity: {:?} %",
            self.ammonia_ppm,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            self.temperature,
            self.humidity
        )
    }
}

#[async_trait]
pub trait AlertNotifier: Send + Sync {
    async fn send_alert(&self, alert: &AmmoniaAlert) -> Result<()>;
}

/// Posts the alert to a configured webhook URL. Stands in for a mail sender
/// at the same interface; delivery transport is a collaborator concern.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    recipient: String,
}

impl WebhookNotifier {
    pub fn new(url: &str, recipient: &str) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(NOTIFY_TIMEOUT).build()?;
        Ok(WebhookNotifier { client, url: url.to_string(), recipient: recipient.to_string() })
    }
}

#[async_trait]
impl AlertNotifier for WebhookNotifier {
    async fn send_alert(&self, alert: &AmmoniaAlert) -> Result<()> {
        let payload = json!({
            "subject": "Ammonia Alert",
            "recipient": self.recipient,
            "body": alert.body(),
            "ammonia_ppm": alert.ammonia_ppm,
            "temperature": alert.temperature,
            "humidity": alert.humidity,
            "timestamp": alert.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
        });
        self.client.post(&self.url).json(&payload).send().await?.error_for_status()?;
        Ok(())
    }
}

/// Notifier that only logs; used when no webhook is configured and in tests.
pub struct NullNotifier;

#[async_trait]
impl AlertNotifier for NullNotifier {
    async fn send_alert(&self, alert: &AmmoniaAlert) -> Result<()> {
        info!(ammonia_ppm = alert.ammonia_ppm, "ammonia alert raised (no notifier configured)");
        Ok(())
    }
}
