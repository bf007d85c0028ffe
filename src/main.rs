use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use airwarden::geocode::{Geocoder, NominatimGeocoder, NullGeocoder};
use airwarden::identity::TokenService;
use airwarden::notify::{AlertNotifier, NullNotifier, WebhookNotifier};
use airwarden::server::{self, AppState};
use airwarden::storage::SharedStore;
use airwarden::telemetry::AnomalyDetector;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let http_port: u16 = std::env::var("AIRWARDEN_HTTP_PORT")
        .unwrap_or_else(|_| "5000".to_string())
        .parse()?;
    let jwt_secret = std::env::var("AIRWARDEN_JWT_SECRET")
        .unwrap_or_else(|_| "your-secret-key-change-in-production".to_string());
    let alert_webhook = std::env::var("AIRWARDEN_ALERT_WEBHOOK").ok();
    let alert_recipient = std::env::var("AIRWARDEN_ALERT_RECIPIENT").unwrap_or_default();
    let geocode_enabled = std::env::var("AIRWARDEN_GEOCODE")
        .map(|v| v != "false")
        .unwrap_or(true);
    let admin_email = std::env::var("AIRWARDEN_ADMIN_EMAIL").unwrap_or_else(|_| "admin@airwarden.local".to_string());
    let admin_password = std::env::var("AIRWARDEN_ADMIN_PASSWORD").unwrap_or_else(|_| "airwarden".to_string());
    info!(
        target: "airwarden",
        "airwarden starting: RUST_LOG='{}', http_port={}, geocode={}, alert_webhook={:?}",
        rust_log, http_port, geocode_enabled, alert_webhook
    );

    let geocoder: Arc<dyn Geocoder> = if geocode_enabled {
        Arc::new(NominatimGeocoder::new()?)
    } else {
        Arc::new(NullGeocoder)
    };
    let notifier: Arc<dyn AlertNotifier> = match alert_webhook {
        Some(ref url) => Arc::new(WebhookNotifier::new(url, &alert_recipient)?),
        None => Arc::new(NullNotifier),
    };

    let state = AppState {
        store: SharedStore::new(),
        tokens: TokenService::new(jwt_secret),
        detector: Arc::new(AnomalyDetector::new()),
        geocoder,
        notifier,
    };
    server::ensure_default_admin(&state, &admin_email, &admin_password);

    server::run_with_port(http_port, state).await
}
