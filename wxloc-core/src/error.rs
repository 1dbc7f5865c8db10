//! Location resolution error types.

use thiserror::Error;

use crate::model::FallbackReason;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LocationError {
    #[error("Device location is not available in this environment")]
    LocatorUnavailable,

    #[error("Device location request failed: {0}")]
    LocatorDenied(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("No results found for location: {0}")]
    NoMatch(String),

    #[error("Geocoder result has no usable place name components")]
    MissingComponents,

    #[error("Invalid coordinate: lat={lat}, lon={lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },

    #[error("Not configured: {0}")]
    NotConfigured(String),
}

impl LocationError {
    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> String {
        match self {
            Self::LocatorUnavailable => FallbackReason::LocatorUnavailable.notice().to_string(),
            Self::LocatorDenied(_) => FallbackReason::LocatorDenied.notice().to_string(),
            Self::NetworkError(_) => "Failed to fetch location data. Check your connection.".to_string(),
            Self::NoMatch(place) => format!("No results found for the location: {}", place),
            Self::MissingComponents => "Unknown place".to_string(),
            Self::InvalidCoordinate { .. } => "Invalid coordinates".to_string(),
            Self::NotConfigured(msg) => msg.clone(),
        }
    }

    /// Whether this error comes from the auto-detect path and is absorbed by a fallback.
    pub fn is_locator_failure(&self) -> bool {
        matches!(self, Self::LocatorUnavailable | Self::LocatorDenied(_))
    }
}

impl From<reqwest::Error> for LocationError {
    fn from(err: reqwest::Error) -> Self {
        Self::NetworkError(err.to_string())
    }
}
