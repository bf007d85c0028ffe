//! Reverse geocoding capability. Enrichment is best-effort: callers must
//! treat any failure here as non-fatal and fall back to the unresolved
//! location placeholder.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::storage::Location;

const GEOCODE_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<Location>;
}

/// Nominatim-backed reverse geocoder.
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new() -> Result<Self> {
        Self::with_base_url("https://nominatim.openstreetmap.org")
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(GEOCODE_TIMEOUT)
            .user_agent("airwarden")
            .build()?;
        Ok(NominatimGeocoder { client, base_url: base_url.trim_end_matches('/').to_string() })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<Location> {
        let url = format!(
            "{}/reverse?format=json&lat={}&lon={}&addressdetails=1",
            self.base_url, latitude, longitude
        );
        let body: serde_json::Value = self.client.get(&url).send().await?.error_for_status()?.json().await?;
        let address = body.get("address").ok_or_else(|| anyhow!("no address in geocode response"))?;
        let field = |k: &str| address.get(k).and_then(|v| v.as_str()).unwrap_or("").to_string();
        // City granularity varies by area; town and village stand in.
        let city = ["city", "town", "village"]
            .into_iter()
            .map(field)
            .find(|v| !v.is_empty())
            .unwrap_or_default();
        Ok(Location {
            country: field("country"),
            state: field("state"),
            city,
            postcode: field("postcode"),
            road: field("road"),
            suburb: field("suburb"),
            neighbourhood: field("neighbourhood"),
            error: None,
        })
    }
}

/// Geocoder that always fails; for tests and deployments without outbound
/// network access, where every report gets the unresolved placeholder.
pub struct NullGeocoder;

#[async_trait]
impl Geocoder for NullGeocoder {
    async fn reverse(&self, _latitude: f64, _longitude: f64) -> Result<Location> {
        Err(anyhow!("geocoding disabled"))
    }
}
