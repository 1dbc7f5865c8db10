//! One-shot device location.
//!
//! A [`DeviceLocator`] answers exactly once per call and never retries.
//! The CLI host has no GPS, so the live fix comes either from the user
//! (`FixedLocator`) or from IP geolocation (`IpLocator`).

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use crate::{error::LocationError, model::Coordinate};

const IP_API_URL: &str = "http://ip-api.com";
const REQUEST_TIMEOUT_SECS: u64 = 10;
pub(crate) const USER_AGENT: &str = concat!("wxloc/", env!("CARGO_PKG_VERSION"));

#[async_trait]
pub trait DeviceLocator: Send + Sync + Debug {
    /// Ask the host for the current position.
    ///
    /// Fails with [`LocationError::LocatorUnavailable`] when the host has no
    /// location capability, or [`LocationError::LocatorDenied`] when it reports an error.
    async fn locate(&self) -> Result<Coordinate, LocationError>;
}

/// Host without any location capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableLocator;

#[async_trait]
impl DeviceLocator for UnavailableLocator {
    async fn locate(&self) -> Result<Coordinate, LocationError> {
        Err(LocationError::LocatorUnavailable)
    }
}

/// Reports a position supplied up front.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocator {
    coordinate: Coordinate,
}

impl FixedLocator {
    pub fn new(coordinate: Coordinate) -> Self {
        Self { coordinate }
    }
}

#[async_trait]
impl DeviceLocator for FixedLocator {
    async fn locate(&self) -> Result<Coordinate, LocationError> {
        Ok(self.coordinate)
    }
}

/// Approximate position from the public IP address (ip-api.com).
#[derive(Debug, Clone)]
pub struct IpLocator {
    http: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

impl IpLocator {
    pub fn new() -> Result<Self, LocationError> {
        Self::with_base_url(IP_API_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, LocationError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl DeviceLocator for IpLocator {
    #[instrument(skip(self), level = "debug")]
    async fn locate(&self) -> Result<Coordinate, LocationError> {
        let url = format!("{}/json/", self.base_url);

        let response = self
            .http
            .get(&url)
            .query(&[("fields", "status,message,lat,lon")])
            .send()
            .await
            .map_err(|e| LocationError::LocatorDenied(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LocationError::LocatorDenied(format!(
                "ip-api returned status {status}"
            )));
        }

        let body: IpApiResponse = response
            .json()
            .await
            .map_err(|e| LocationError::LocatorDenied(format!("unreadable response: {e}")))?;

        if body.status != "success" {
            let reason = body.message.unwrap_or_else(|| body.status.clone());
            return Err(LocationError::LocatorDenied(reason));
        }

        match (body.lat, body.lon) {
            (Some(lat), Some(lon)) => Coordinate::new(lat, lon)
                .map_err(|e| LocationError::LocatorDenied(e.to_string())),
            _ => Err(LocationError::LocatorDenied(
                "response is missing coordinates".to_string(),
            )),
        }
    }
}
