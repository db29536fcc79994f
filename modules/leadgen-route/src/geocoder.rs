use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::geo::Coordinate;

/// Free-text address → coordinates.
///
/// `Ok(None)` means "not found"; `Err` is reserved for transport or provider
/// failures.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinate>>;
}

/// Geocode with a bounded wait. Timeouts, errors, and out-of-range results
/// all come back as `None`; the caller treats the address as un-geocodable.
pub async fn geocode_bounded(
    geocoder: &dyn Geocoder,
    address: &str,
    timeout: Duration,
) -> Option<Coordinate> {
    match tokio::time::timeout(timeout, geocoder.geocode(address)).await {
        Ok(Ok(Some(coord))) if coord.is_valid() => Some(coord),
        Ok(Ok(Some(coord))) => {
            warn!(address, lat = coord.lat, lng = coord.lng, "Geocoder returned out-of-range coordinates");
            None
        }
        Ok(Ok(None)) => {
            debug!(address, "No geocoding results");
            None
        }
        Ok(Err(e)) => {
            warn!(address, error = %e, "Geocoding failed");
            None
        }
        Err(_) => {
            warn!(address, timeout_secs = timeout.as_secs_f64(), "Geocoding timed out");
            None
        }
    }
}

#[derive(Deserialize)]
struct NominatimResult {
    lat: String,
    lon: String,
}

const MAX_ADDRESS_LEN: usize = 200;

/// OpenStreetMap Nominatim search endpoint.
pub struct NominatimGeocoder {
    client: reqwest::Client,
    endpoint: String,
    user_agent: String,
}

impl NominatimGeocoder {
    pub fn new(client: reqwest::Client, endpoint: &str, user_agent: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            user_agent: user_agent.to_string(),
        }
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinate>> {
        let address = address.trim();
        if address.is_empty() || address.len() > MAX_ADDRESS_LEN {
            debug!(len = address.len(), "Address empty or too long, not geocoding");
            return Ok(None);
        }

        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .header("User-Agent", self.user_agent.as_str())
            .send()
            .await?
            .error_for_status()?;

        let results: Vec<NominatimResult> = resp.json().await?;
        parse_first(results)
    }
}

fn parse_first(results: Vec<NominatimResult>) -> Result<Option<Coordinate>> {
    let Some(first) = results.into_iter().next() else {
        return Ok(None);
    };
    let lat: f64 = first.lat.parse()?;
    let lng: f64 = first.lon.parse()?;
    Ok(Some(Coordinate::new(lat, lng)))
}
