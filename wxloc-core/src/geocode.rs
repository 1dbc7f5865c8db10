//! Forward and reverse geocoding against the OpenCage API.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use crate::{
    error::LocationError,
    locator::USER_AGENT,
    model::{AddressComponents, Coordinate, GeocodeResult},
};

const OPENCAGE_URL: &str = "https://api.opencagedata.com";
const REQUEST_TIMEOUT_SECS: u64 = 10;

#[async_trait]
pub trait Geocoder: Send + Sync + Debug {
    /// Resolve free text to the provider's top-ranked match.
    async fn forward(&self, place_name: &str) -> Result<GeocodeResult, LocationError>;

    /// Resolve a coordinate to the place containing it.
    async fn reverse(&self, coordinate: Coordinate) -> Result<GeocodeResult, LocationError>;
}

#[derive(Debug, Clone)]
pub struct OpenCageGeocoder {
    api_key: String,
    http: Client,
    base_url: String,
}

impl OpenCageGeocoder {
    pub fn new(api_key: String) -> Result<Self, LocationError> {
        Self::with_base_url(api_key, OPENCAGE_URL)
    }

    pub fn with_base_url(api_key: String, base_url: &str) -> Result<Self, LocationError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            api_key,
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn query(&self, q: &str) -> Result<Vec<OcResult>, LocationError> {
        let url = format!("{}/geocode/v1/json", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&[("q", q), ("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| LocationError::NetworkError(format!("OpenCage request failed: {e}")))?;

        let status = res.status();
        let body = res.text().await.map_err(|e| {
            LocationError::NetworkError(format!("Failed to read OpenCage response body: {e}"))
        })?;

        if !status.is_success() {
            return Err(LocationError::NetworkError(format!(
                "OpenCage request failed with status {}: {}",
                status,
                truncate_body(&body),
            )));
        }

        let parsed: OcResponse = serde_json::from_str(&body).map_err(|e| {
            LocationError::NetworkError(format!("Failed to parse OpenCage JSON: {e}"))
        })?;

        tracing::debug!(results = parsed.results.len(), "OpenCage responded");
        Ok(parsed.results)
    }
}

#[derive(Debug, Deserialize)]
struct OcResponse {
    #[serde(default)]
    results: Vec<OcResult>,
}

#[derive(Debug, Deserialize)]
struct OcResult {
    geometry: OcGeometry,
    #[serde(default)]
    components: OcComponents,
}

#[derive(Debug, Deserialize)]
struct OcGeometry {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Default, Deserialize)]
struct OcComponents {
    village: Option<String>,
    town: Option<String>,
    city: Option<String>,
    county: Option<String>,
    state: Option<String>,
    country: Option<String>,
    #[serde(rename = "_normalized_city")]
    normalized_city: Option<String>,
}

impl TryFrom<OcResult> for GeocodeResult {
    type Error = LocationError;

    fn try_from(raw: OcResult) -> Result<Self, Self::Error> {
        // The provider calls longitude `lng`; it only survives as `Coordinate::lon`.
        let coordinate = Coordinate::new(raw.geometry.lat, raw.geometry.lng)?;
        let c = raw.components;

        Ok(GeocodeResult {
            coordinate,
            components: AddressComponents {
                village: c.village,
                town: c.town,
                city: c.city,
                county: c.county,
                state: c.state,
                country: c.country,
                normalized_city: c.normalized_city,
            },
        })
    }
}

/// Strip every whitespace character so the query survives URL encoding intact.
pub fn clean_query(place_name: &str) -> String {
    place_name.chars().filter(|c| !c.is_whitespace()).collect()
}

#[async_trait]
impl Geocoder for OpenCageGeocoder {
    #[instrument(skip(self), level = "info")]
    async fn forward(&self, place_name: &str) -> Result<GeocodeResult, LocationError> {
        let query = clean_query(place_name);
        tracing::debug!(%query, "forward geocoding");

        let first = self
            .query(&query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LocationError::NoMatch(place_name.to_string()))?;

        GeocodeResult::try_from(first)
    }

    #[instrument(skip(self), level = "info")]
    async fn reverse(&self, coordinate: Coordinate) -> Result<GeocodeResult, LocationError> {
        let query = format!("{},{}", coordinate.lat(), coordinate.lon());

        let first = self
            .query(&query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LocationError::NoMatch(query.clone()))?;

        GeocodeResult::try_from(first)
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_query_removes_all_whitespace() {
        assert_eq!(clean_query("Atlanta, GA"), "Atlanta,GA");
        assert_eq!(clean_query("  New\tYork \n City "), "NewYorkCity");
        assert_eq!(clean_query(""), "");
    }

    #[test]
    fn raw_result_renames_lng_to_lon() {
        let raw: OcResult = serde_json::from_value(serde_json::json!({
            "geometry": { "lat": 10, "lng": 20 },
            "components": {}
        }))
        .unwrap();

        let result = GeocodeResult::try_from(raw).unwrap();
        assert_eq!(result.coordinate.lat(), 10.0);
        assert_eq!(result.coordinate.lon(), 20.0);

        let value = serde_json::to_value(result.coordinate).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(obj["lat"], 10.0);
        assert_eq!(obj["lon"], 20.0);
        assert!(!obj.contains_key("lng"));
    }

    #[test]
    fn raw_result_reads_components() {
        let raw: OcResult = serde_json::from_value(serde_json::json!({
            "geometry": { "lat": 34.0, "lng": -84.6 },
            "components": {
                "village": "Acworth",
                "state": "Georgia",
                "country": "United States",
                "_normalized_city": "Acworth",
                "_type": "village"
            }
        }))
        .unwrap();

        let result = GeocodeResult::try_from(raw).unwrap();
        assert_eq!(result.components.village.as_deref(), Some("Acworth"));
        assert_eq!(result.components.state.as_deref(), Some("Georgia"));
        assert_eq!(result.components.normalized_city.as_deref(), Some("Acworth"));
        assert_eq!(result.components.city, None);
    }

    #[test]
    fn raw_result_with_bad_coordinates_is_rejected() {
        let raw: OcResult = serde_json::from_value(serde_json::json!({
            "geometry": { "lat": 123.0, "lng": 0.0 }
        }))
        .unwrap();

        assert!(matches!(
            GeocodeResult::try_from(raw),
            Err(LocationError::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn truncate_body_limits_length() {
        let long = "x".repeat(500);
        let t = truncate_body(&long);
        assert_eq!(t.len(), 203);
        assert_eq!(truncate_body("short"), "short");
    }
}
