//! Core library for the `wxloc` CLI.
//!
//! This crate defines:
//! - The session-scoped coordinate cache
//! - Device location and geocoding abstractions
//! - The location resolver that every weather view asks for coordinates
//! - Configuration handling
//!
//! It is used by `wxloc-cli`, but can also be reused by other front ends.

pub mod cache;
pub mod config;
pub mod error;
pub mod format;
pub mod geocode;
pub mod locator;
pub mod model;
pub mod resolver;

pub use cache::CoordinateCache;
pub use config::{Config, GeocoderConfig, LocatorKind};
pub use error::LocationError;
pub use format::format_name;
pub use geocode::{Geocoder, OpenCageGeocoder};
pub use locator::{DeviceLocator, FixedLocator, IpLocator, UnavailableLocator};
pub use model::{
    AddressComponents, CachedLocation, Coordinate, DEFAULT_LOCATION, FallbackReason,
    GeocodeResult, Resolution, ResolutionSource,
};
pub use resolver::LocationResolver;
