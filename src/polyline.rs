//! Encoded polyline handling (Google polyline algorithm, precision 5).
//!
//! Routing providers return route geometry in this compact form. Decoding
//! happens once when a [`Route`](crate::Route) is built; the encoded string is
//! kept verbatim for transport and logging.

use geo::{Coord, LineString};

use crate::error::{Result, TrackingError};
use crate::GpsPoint;

/// Coordinate precision used by the Google polyline format.
pub const POLYLINE_PRECISION: u32 = 5;

/// Decode an encoded polyline into ordered GPS points.
///
/// An empty string decodes to an empty path. Malformed input is an error.
///
/// # Example
/// ```
/// use route_progress::polyline::decode_polyline;
///
/// let points = decode_polyline("_p~iF~ps|U_ulLnnqC_mqNvxq`@").unwrap();
/// assert_eq!(points.len(), 3);
/// assert!((points[0].latitude - 38.5).abs() < 1e-9);
/// assert!((points[0].longitude + 120.2).abs() < 1e-9);
/// ```
pub fn decode_polyline(encoded: &str) -> Result<Vec<GpsPoint>> {
    if encoded.is_empty() {
        return Ok(Vec::new());
    }

    let line = polyline::decode_polyline(encoded, POLYLINE_PRECISION).map_err(|e| {
        TrackingError::PolylineDecode {
            message: format!("{:?}", e),
        }
    })?;

    // geo stores (x, y) = (lng, lat)
    Ok(line.coords().map(|c| GpsPoint::new(c.y, c.x)).collect())
}

/// Encode GPS points as a polyline string.
pub fn encode_polyline(points: &[GpsPoint]) -> Result<String> {
    let line: LineString<f64> = points
        .iter()
        .map(|p| Coord {
            x: p.longitude,
            y: p.latitude,
        })
        .collect();

    polyline::encode_coordinates(line, POLYLINE_PRECISION).map_err(|e| {
        TrackingError::PolylineDecode {
            message: format!("{:?}", e),
        }
    })
}
