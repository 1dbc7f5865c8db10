//! "City, Region" display names from geocoder components.

use crate::{error::LocationError, model::AddressComponents};

/// Format components as `"<city>, <region>"`.
///
/// City-level name: village, town, city, county, then the provider's generic
/// name. Region: state, then country. With no region the city stands alone.
/// Blank fields count as absent.
pub fn format_name(components: &AddressComponents) -> Result<String, LocationError> {
    let place = [
        &components.village,
        &components.town,
        &components.city,
        &components.county,
        &components.normalized_city,
    ]
    .into_iter()
    .find_map(present)
    .ok_or(LocationError::MissingComponents)?;

    let region = present(&components.state).or_else(|| present(&components.country));

    Ok(match region {
        Some(region) => format!("{}, {}", place, region),
        None => place.to_string(),
    })
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
