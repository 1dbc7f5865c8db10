use serde::{Deserialize, Serialize};

use crate::error::LocationError;

/// Built-in fallback site used when nothing better is available.
pub const DEFAULT_LOCATION: Coordinate = Coordinate {
    lat: 34.038287,
    lon: -84.581747,
};

/// A latitude/longitude pair. Only constructible with finite, in-range values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    lat: f64,
    lon: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = LocationError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Coordinate::new(raw.lat, raw.lon)
    }
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self, LocationError> {
        let valid = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);

        if valid {
            Ok(Self { lat, lon })
        } else {
            Err(LocationError::InvalidCoordinate { lat, lon })
        }
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6}, {:.6}", self.lat, self.lon)
    }
}

/// The single location held by the session cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedLocation {
    pub coordinate: Coordinate,
    pub display_name: Option<String>,
}

impl CachedLocation {
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            display_name: None,
        }
    }

    pub fn named(coordinate: Coordinate, display_name: impl Into<String>) -> Self {
        Self {
            coordinate,
            display_name: Some(display_name.into()),
        }
    }
}

/// Administrative components of a geocoder match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressComponents {
    pub village: Option<String>,
    pub town: Option<String>,
    pub city: Option<String>,
    pub county: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    /// Provider-supplied generic place name, used when no specific level is present.
    pub normalized_city: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeResult {
    pub coordinate: Coordinate,
    pub components: AddressComponents,
}

/// Why the resolver fell back to the default location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    LocatorUnavailable,
    LocatorDenied,
}

impl FallbackReason {
    pub fn notice(&self) -> &'static str {
        match self {
            FallbackReason::LocatorUnavailable => {
                "Geolocation is not supported here. Using default location."
            }
            FallbackReason::LocatorDenied => "Error getting location. Using default location.",
        }
    }
}

/// Which step of the resolver produced the coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    Cache,
    Device,
    Default { reason: FallbackReason },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub coordinate: Coordinate,
    pub source: ResolutionSource,
}

impl Resolution {
    /// Notice for the user when the default location was used.
    pub fn fallback_notice(&self) -> Option<&'static str> {
        match self.source {
            ResolutionSource::Default { reason } => Some(reason.notice()),
            _ => None,
        }
    }
}
