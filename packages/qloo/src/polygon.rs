//! WKT envelope of a location group, used as the insights location signal.

use geo::{BoundingRect, MultiPoint, Point};

use crate::QlooError;

/// Minimum number of coordinates needed to build an envelope.
pub const MIN_POLYGON_POINTS: usize = 3;

/// Builds the WKT bounding rectangle of `[latitude, longitude]` pairs.
///
/// The ring is written in `lon lat` order, counter-clockwise from the
/// south-west corner and closed.
///
/// # Errors
///
/// Returns [`QlooError::InvalidInput`] for fewer than
/// [`MIN_POLYGON_POINTS`] coordinates.
pub fn bounding_polygon_wkt(coordinates: &[[f64; 2]]) -> Result<String, QlooError> {
    if coordinates.len() < MIN_POLYGON_POINTS {
        return Err(QlooError::InvalidInput {
            message: format!(
                "Need at least {MIN_POLYGON_POINTS} coordinates to create polygon, got {}",
                coordinates.len()
            ),
        });
    }

    let points: MultiPoint<f64> = coordinates
        .iter()
        .map(|[lat, lon]| Point::new(*lon, *lat))
        .collect();

    let rect = points.bounding_rect().ok_or_else(|| QlooError::InvalidInput {
        message: "coordinates have no bounding rectangle".to_string(),
    })?;
    let (min, max) = (rect.min(), rect.max());

    Ok(format!(
        "POLYGON(({} {}, {} {}, {} {}, {} {}, {} {}))",
        min.x, min.y, max.x, min.y, max.x, max.y, min.x, max.y, min.x, min.y
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_swaps_to_lon_lat_order() {
        let wkt =
            bounding_polygon_wkt(&[[40.5, -74.25], [40.75, -73.5], [40.625, -74.0]]).unwrap();
        assert_eq!(
            wkt,
            "POLYGON((-74.25 40.5, -73.5 40.5, -73.5 40.75, -74.25 40.75, -74.25 40.5))"
        );
    }

    #[test]
    fn fewer_than_three_points_is_an_error() {
        let err = bounding_polygon_wkt(&[[1.0, 2.0], [3.0, 4.0]]).unwrap_err();
        assert!(err.to_string().contains("got 2"));
    }
}
