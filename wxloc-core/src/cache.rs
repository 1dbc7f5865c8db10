//! Session-scoped coordinate cache.
//!
//! Holds at most one resolved location. Storage is laid out the way the
//! dashboard keeps it in session storage: the serialized coordinate under
//! [`LOCATION_KEY`] and the display string under [`LOCATION_NAME_KEY`].

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::model::{CachedLocation, Coordinate};

pub const LOCATION_KEY: &str = "location";
pub const LOCATION_NAME_KEY: &str = "locationName";

#[derive(Debug, Default)]
struct Slot {
    storage: HashMap<&'static str, String>,
    stored_at: Option<DateTime<Utc>>,
}

/// Thread-safe holder of the current [`CachedLocation`].
///
/// Every operation takes the same lock, so concurrent resolutions never
/// observe a coordinate without its name. Overlapping writers are last-write-wins.
#[derive(Debug, Default)]
pub struct CoordinateCache {
    ttl: Option<Duration>,
    slot: Mutex<Slot>,
}

impl CoordinateCache {
    /// Empty cache whose entries never expire.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty cache whose entries are treated as absent once they are `ttl` old.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            slot: Mutex::new(Slot::default()),
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn get(&self) -> Option<CachedLocation> {
        let slot = self.slot.lock();

        if let (Some(ttl), Some(stored_at)) = (self.ttl, slot.stored_at) {
            let age = (Utc::now() - stored_at).to_std().unwrap_or_default();
            if age >= ttl {
                tracing::debug!(?age, ?ttl, "cached location expired");
                return None;
            }
        }

        let raw = slot.storage.get(LOCATION_KEY)?;
        let coordinate: Coordinate = match serde_json::from_str(raw) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Ignoring unreadable cached location {:?}: {}", raw, e);
                return None;
            }
        };

        Some(CachedLocation {
            coordinate,
            display_name: slot.storage.get(LOCATION_NAME_KEY).cloned(),
        })
    }

    pub fn set(&self, location: CachedLocation) {
        let serialized = match serde_json::to_string(&location.coordinate) {
            Ok(s) => s,
            Err(e) => {
                // Finite f64 pairs always serialize.
                tracing::error!("Failed to serialize coordinate: {}", e);
                return;
            }
        };

        let mut slot = self.slot.lock();
        slot.storage.insert(LOCATION_KEY, serialized);
        match location.display_name {
            Some(name) => {
                slot.storage.insert(LOCATION_NAME_KEY, name);
            }
            None => {
                slot.storage.remove(LOCATION_NAME_KEY);
            }
        }
        slot.stored_at = Some(Utc::now());
    }

    pub fn clear(&self) {
        let mut slot = self.slot.lock();
        slot.storage.remove(LOCATION_KEY);
        slot.storage.remove(LOCATION_NAME_KEY);
        slot.stored_at = None;
    }

    /// Attach a display name, but only if `coordinate` is still the cached one.
    ///
    /// Returns whether the name was stored.
    pub fn enrich(&self, coordinate: Coordinate, display_name: String) -> bool {
        let mut slot = self.slot.lock();
        let current = slot
            .storage
            .get(LOCATION_KEY)
            .and_then(|raw| serde_json::from_str::<Coordinate>(raw).ok());

        if current != Some(coordinate) {
            return false;
        }

        slot.storage.insert(LOCATION_NAME_KEY, display_name);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.get().is_none()
    }

    #[cfg(test)]
    fn put_raw(&self, key: &'static str, value: &str) {
        let mut slot = self.slot.lock();
        slot.storage.insert(key, value.to_string());
        slot.stored_at = Some(Utc::now());
    }
}
