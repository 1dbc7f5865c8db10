//! Location resolution: cache, then device, then the configured default.
//!
//! Auto-detect failures are absorbed into the default location. Failures of an
//! explicit place-name lookup are returned to the caller and never touch the cache.
//! The resolver is the only writer of the [`CoordinateCache`].

use std::sync::Arc;

use tracing::instrument;

use crate::{
    cache::CoordinateCache,
    error::LocationError,
    format::format_name,
    geocode::Geocoder,
    locator::DeviceLocator,
    model::{
        CachedLocation, Coordinate, DEFAULT_LOCATION, FallbackReason, Resolution, ResolutionSource,
    },
};

/// Steps of [`LocationResolver::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    CheckCache,
    UseDevice,
    UseDefault(FallbackReason),
}

#[derive(Debug, Clone)]
pub struct LocationResolver {
    cache: Arc<CoordinateCache>,
    locator: Arc<dyn DeviceLocator>,
    geocoder: Option<Arc<dyn Geocoder>>,
    default_location: Coordinate,
}

impl LocationResolver {
    pub fn new(cache: Arc<CoordinateCache>, locator: Arc<dyn DeviceLocator>) -> Self {
        Self {
            cache,
            locator,
            geocoder: None,
            default_location: DEFAULT_LOCATION,
        }
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn with_default_location(mut self, default_location: Coordinate) -> Self {
        self.default_location = default_location;
        self
    }

    pub fn default_location(&self) -> Coordinate {
        self.default_location
    }

    pub fn cached(&self) -> Option<CachedLocation> {
        self.cache.get()
    }

    /// Produce a coordinate for the current user. Always succeeds.
    #[instrument(skip(self), level = "debug")]
    pub async fn resolve(&self) -> Resolution {
        let mut step = Step::CheckCache;

        loop {
            tracing::trace!(?step, "resolve");
            step = match step {
                Step::CheckCache => match self.cache.get() {
                    Some(cached) => {
                        return Resolution {
                            coordinate: cached.coordinate,
                            source: ResolutionSource::Cache,
                        };
                    }
                    None => Step::UseDevice,
                },
                Step::UseDevice => match self.locator.locate().await {
                    Ok(coordinate) => {
                        self.cache.set(CachedLocation::new(coordinate));
                        tracing::info!(%coordinate, "Resolved device location");
                        return Resolution {
                            coordinate,
                            source: ResolutionSource::Device,
                        };
                    }
                    Err(LocationError::LocatorUnavailable) => {
                        Step::UseDefault(FallbackReason::LocatorUnavailable)
                    }
                    Err(e) => {
                        tracing::warn!("Device location failed: {}", e);
                        Step::UseDefault(FallbackReason::LocatorDenied)
                    }
                },
                Step::UseDefault(reason) => {
                    let coordinate = self.default_location;
                    self.cache.set(CachedLocation::new(coordinate));
                    tracing::warn!(%coordinate, "{}", reason.notice());
                    return Resolution {
                        coordinate,
                        source: ResolutionSource::Default { reason },
                    };
                }
            };
        }
    }

    /// Resolve an explicit place name, replacing the cached location on success.
    #[instrument(skip(self), level = "debug")]
    pub async fn resolve_by_name(&self, place_name: &str) -> Result<Coordinate, LocationError> {
        let geocoder = self.geocoder.as_ref().ok_or_else(|| {
            LocationError::NotConfigured(
                "No geocoding API key configured. Hint: run `wxloc configure`.".to_string(),
            )
        })?;

        let result = geocoder.forward(place_name).await?;

        let display_name = match format_name(&result.components) {
            Ok(name) => Some(name),
            Err(e) => {
                tracing::debug!("No display name for {:?}: {}", place_name, e);
                None
            }
        };

        self.cache.set(CachedLocation {
            coordinate: result.coordinate,
            display_name,
        });

        tracing::info!(coordinate = %result.coordinate, "Resolved {:?}", place_name);
        Ok(result.coordinate)
    }

    /// Forget the cached location so the next [`resolve`](Self::resolve) starts over.
    pub fn invalidate(&self) {
        self.cache.clear();
        tracing::debug!("Cached location cleared");
    }

    /// Display name of the cached location, reverse geocoding it on first use.
    ///
    /// Lookup failures are logged and yield `None`; the cache is left as it was.
    pub async fn display_name(&self) -> Option<String> {
        let cached = self.cache.get()?;
        if cached.display_name.is_some() {
            return cached.display_name;
        }

        let geocoder = self.geocoder.as_ref()?;
        let result = match geocoder.reverse(cached.coordinate).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Reverse geocode failed for {}: {}", cached.coordinate, e);
                return None;
            }
        };

        let name = match format_name(&result.components) {
            Ok(name) => name,
            Err(e) => {
                tracing::debug!("No display name for {}: {}", cached.coordinate, e);
                return None;
            }
        };

        if !self.cache.enrich(cached.coordinate, name.clone()) {
            tracing::debug!("Cached location changed during reverse geocode; name not stored");
        }
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AddressComponents, GeocodeResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct CountingLocator {
        calls: AtomicUsize,
        outcome: Result<Coordinate, LocationError>,
    }

    impl CountingLocator {
        fn new(outcome: Result<Coordinate, LocationError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                outcome,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DeviceLocator for CountingLocator {
        async fn locate(&self) -> Result<Coordinate, LocationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    #[derive(Debug)]
    struct StubGeocoder {
        forward: Result<GeocodeResult, LocationError>,
        reverse: Result<GeocodeResult, LocationError>,
    }

    #[async_trait]
    impl Geocoder for StubGeocoder {
        async fn forward(&self, _place_name: &str) -> Result<GeocodeResult, LocationError> {
            self.forward.clone()
        }

        async fn reverse(&self, _coordinate: Coordinate) -> Result<GeocodeResult, LocationError> {
            self.reverse.clone()
        }
    }

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    fn acworth() -> GeocodeResult {
        GeocodeResult {
            coordinate: coord(34.0662, -84.6769),
            components: AddressComponents {
                village: Some("Acworth".into()),
                state: Some("Georgia".into()),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn cached_location_short_circuits_device() {
        let cache = Arc::new(CoordinateCache::new());
        cache.set(CachedLocation::new(coord(1.0, 2.0)));
        let locator = CountingLocator::new(Ok(coord(9.0, 9.0)));
        let resolver = LocationResolver::new(cache, locator.clone());

        let resolution = resolver.resolve().await;

        assert_eq!(resolution.coordinate, coord(1.0, 2.0));
        assert_eq!(resolution.source, ResolutionSource::Cache);
        assert_eq!(locator.calls(), 0);
    }

    #[tokio::test]
    async fn device_fix_is_cached_without_name() {
        let cache = Arc::new(CoordinateCache::new());
        let locator = CountingLocator::new(Ok(coord(47.6, -122.3)));
        let resolver = LocationResolver::new(cache.clone(), locator.clone());

        let first = resolver.resolve().await;
        assert_eq!(first.source, ResolutionSource::Device);
        assert_eq!(cache.get(), Some(CachedLocation::new(coord(47.6, -122.3))));

        let second = resolver.resolve().await;
        assert_eq!(second.source, ResolutionSource::Cache);
        assert_eq!(locator.calls(), 1);
    }

    #[tokio::test]
    async fn unavailable_locator_falls_back_to_default() {
        let cache = Arc::new(CoordinateCache::new());
        let locator = CountingLocator::new(Err(LocationError::LocatorUnavailable));
        let resolver = LocationResolver::new(cache.clone(), locator);

        let resolution = resolver.resolve().await;

        assert_eq!(resolution.coordinate, coord(34.038287, -84.581747));
        assert_eq!(
            resolution.source,
            ResolutionSource::Default {
                reason: FallbackReason::LocatorUnavailable
            }
        );
        assert!(resolution.fallback_notice().is_some());
        assert_eq!(cache.get().unwrap().coordinate, coord(34.038287, -84.581747));
    }

    #[tokio::test]
    async fn denied_locator_falls_back_to_configured_default() {
        let cache = Arc::new(CoordinateCache::new());
        let locator = CountingLocator::new(Err(LocationError::LocatorDenied("timeout".into())));
        let resolver =
            LocationResolver::new(cache.clone(), locator).with_default_location(coord(51.5, -0.12));

        let resolution = resolver.resolve().await;

        assert_eq!(resolution.coordinate, coord(51.5, -0.12));
        assert_eq!(
            resolution.source,
            ResolutionSource::Default {
                reason: FallbackReason::LocatorDenied
            }
        );
        assert_eq!(cache.get().unwrap().coordinate, coord(51.5, -0.12));
    }

    #[tokio::test]
    async fn invalidate_forces_device_again() {
        let cache = Arc::new(CoordinateCache::new());
        let locator = CountingLocator::new(Ok(coord(1.0, 1.0)));
        let resolver = LocationResolver::new(cache.clone(), locator.clone());

        resolver.resolve().await;
        resolver.invalidate();
        assert!(cache.get().is_none());

        let again = resolver.resolve().await;
        assert_eq!(again.source, ResolutionSource::Device);
        assert_eq!(locator.calls(), 2);
    }

    #[tokio::test]
    async fn resolve_by_name_caches_coordinate_and_name() {
        let cache = Arc::new(CoordinateCache::new());
        let geocoder = Arc::new(StubGeocoder {
            forward: Ok(acworth()),
            reverse: Err(LocationError::NoMatch("unused".into())),
        });
        let resolver = LocationResolver::new(cache.clone(), CountingLocator::new(Ok(coord(0.0, 0.0))))
            .with_geocoder(geocoder);

        let c = resolver.resolve_by_name("Acworth").await.unwrap();

        assert_eq!(c, acworth().coordinate);
        assert_eq!(
            cache.get(),
            Some(CachedLocation::named(acworth().coordinate, "Acworth, Georgia"))
        );
    }

    #[tokio::test]
    async fn resolve_by_name_failure_leaves_cache_alone() {
        let cache = Arc::new(CoordinateCache::new());
        cache.set(CachedLocation::named(coord(1.0, 2.0), "Home"));
        let geocoder = Arc::new(StubGeocoder {
            forward: Err(LocationError::NetworkError("offline".into())),
            reverse: Err(LocationError::NetworkError("offline".into())),
        });
        let resolver = LocationResolver::new(cache.clone(), CountingLocator::new(Ok(coord(0.0, 0.0))))
            .with_geocoder(geocoder);

        let err = resolver.resolve_by_name("Atlanta").await.unwrap_err();

        assert!(matches!(err, LocationError::NetworkError(_)));
        assert_eq!(cache.get(), Some(CachedLocation::named(coord(1.0, 2.0), "Home")));
    }

    #[tokio::test]
    async fn resolve_by_name_without_geocoder_is_not_configured() {
        let cache = Arc::new(CoordinateCache::new());
        let resolver = LocationResolver::new(cache.clone(), CountingLocator::new(Ok(coord(0.0, 0.0))));

        let err = resolver.resolve_by_name("Atlanta").await.unwrap_err();
        assert!(matches!(err, LocationError::NotConfigured(_)));
        assert!(cache.get().is_none());
    }

    #[tokio::test]
    async fn display_name_enriches_device_fix() {
        let cache = Arc::new(CoordinateCache::new());
        let fix = acworth().coordinate;
        let geocoder = Arc::new(StubGeocoder {
            forward: Err(LocationError::NoMatch("unused".into())),
            reverse: Ok(acworth()),
        });
        let resolver =
            LocationResolver::new(cache.clone(), CountingLocator::new(Ok(fix))).with_geocoder(geocoder);

        assert_eq!(resolver.display_name().await, None);

        resolver.resolve().await;
        assert_eq!(resolver.display_name().await.as_deref(), Some("Acworth, Georgia"));
        assert_eq!(cache.get(), Some(CachedLocation::named(fix, "Acworth, Georgia")));
    }

    #[tokio::test]
    async fn display_name_failure_leaves_cache_alone() {
        let cache = Arc::new(CoordinateCache::new());
        cache.set(CachedLocation::new(coord(1.0, 2.0)));
        let geocoder = Arc::new(StubGeocoder {
            forward: Err(LocationError::NoMatch("unused".into())),
            reverse: Err(LocationError::NetworkError("offline".into())),
        });
        let resolver = LocationResolver::new(cache.clone(), CountingLocator::new(Ok(coord(0.0, 0.0))))
            .with_geocoder(geocoder);

        assert_eq!(resolver.display_name().await, None);
        assert_eq!(cache.get(), Some(CachedLocation::new(coord(1.0, 2.0))));
    }
}
