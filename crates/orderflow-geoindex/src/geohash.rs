//! Geohash encoding, decoding, neighbor expansion, and radius coverage.
//!
//! A geohash is a base-32 string naming a rectangular lat/lng cell via
//! interleaved binary subdivision; longer strings mean smaller cells.
//! These are pure functions with no index state.

/// Standard geohash base-32 alphabet (no a, i, l, o).
const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Mean Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A decoded geohash cell: its center point and angular half-widths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decoded {
    /// Latitude of the cell center.
    pub lat: f64,
    /// Longitude of the cell center.
    pub lng: f64,
    /// Half the cell's latitude span.
    pub lat_err: f64,
    /// Half the cell's longitude span.
    pub lng_err: f64,
}

/// Encodes a point into a geohash of the given precision (clamped to 1..=12).
///
/// Bits alternate starting with longitude; every 5 bits become one base-32
/// character.
pub fn encode(lat: f64, lng: f64, precision: u8) -> String {
    let precision = precision.clamp(1, 12) as usize;
    let mut lat_range = (-90.0f64, 90.0f64);
    let mut lng_range = (-180.0f64, 180.0f64);

    let mut out = String::with_capacity(precision);
    let mut idx = 0usize;
    let mut bit = 0u8;
    let mut even = true;

    while out.len() < precision {
        let (value, range) = if even {
            (lng, &mut lng_range)
        } else {
            (lat, &mut lat_range)
        };
        let mid = (range.0 + range.1) / 2.0;
        idx <<= 1;
        if value >= mid {
            idx |= 1;
            range.0 = mid;
        } else {
            range.1 = mid;
        }
        even = !even;
        bit += 1;
        if bit == 5 {
            out.push(BASE32[idx] as char);
            idx = 0;
            bit = 0;
        }
    }

    out
}

/// Decodes a geohash to its cell center and half-widths by bisecting the
/// same ranges bit by bit.
///
/// Returns `None` for an empty string or characters outside the base-32
/// alphabet.
pub fn decode(hash: &str) -> Option<Decoded> {
    if hash.is_empty() {
        return None;
    }

    let mut lat_range = (-90.0f64, 90.0f64);
    let mut lng_range = (-180.0f64, 180.0f64);
    let mut even = true;

    for c in hash.bytes() {
        let value = BASE32.iter().position(|&b| b == c.to_ascii_lowercase())?;
        for shift in (0..5).rev() {
            let range = if even { &mut lng_range } else { &mut lat_range };
            let mid = (range.0 + range.1) / 2.0;
            if (value >> shift) & 1 == 1 {
                range.0 = mid;
            } else {
                range.1 = mid;
            }
            even = !even;
        }
    }

    Some(Decoded {
        lat: (lat_range.0 + lat_range.1) / 2.0,
        lng: (lng_range.0 + lng_range.1) / 2.0,
        lat_err: (lat_range.1 - lat_range.0) / 2.0,
        lng_err: (lng_range.1 - lng_range.0) / 2.0,
    })
}

/// Returns the cell plus its 8 geometric neighbors, deduplicated and in a
/// stable order.
///
/// Neighbors are found by perturbing the decoded center by twice the
/// cell's half-width in each compass direction and re-encoding. Candidates
/// outside valid lat/lng bounds are discarded, so cells at the poles yield
/// fewer than 9 entries.
pub fn neighbors(hash: &str) -> Vec<String> {
    let Some(center) = decode(hash) else {
        return Vec::new();
    };
    let precision = hash.len() as u8;

    let mut out = Vec::with_capacity(9);
    for dlat in [1.0, 0.0, -1.0] {
        for dlng in [-1.0, 0.0, 1.0] {
            let lat = center.lat + dlat * center.lat_err * 2.0;
            let lng = center.lng + dlng * center.lng_err * 2.0;
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
                continue;
            }
            let cell = encode(lat, lng, precision);
            if !out.contains(&cell) {
                out.push(cell);
            }
        }
    }
    out
}

/// Maps a query radius to the coverage precision: coarser cells trade
/// precision for fewer cells to union at large radii.
///
/// The bands (~150 m cells at 7 chars down to ~39 km at 4) are heuristic
/// approximations tuned for mid-latitude use; cell widths shrink toward
/// the poles, so re-validate before relying on them elsewhere.
pub fn precision_for_radius(radius_km: f64) -> u8 {
    if radius_km <= 1.0 {
        7
    } else if radius_km <= 5.0 {
        6
    } else if radius_km <= 20.0 {
        5
    } else {
        4
    }
}

/// Computes the set of geohash cells covering a disk of `radius_km`
/// around the point.
///
/// The coverage precision is chosen by radius band and clamped so it never
/// exceeds `max_precision` (the precision the index stores at). Radii up
/// to 3.5 km use one ring of 9 cells; larger radii expand a second,
/// deduplicated ring of neighbors-of-neighbors.
///
/// The hard guarantee is geometric, not radial: any point within `rings`
/// whole cell spans of the query (along both axes) falls in the covering.
/// That envelope is one cell span at the 1-ring bands (~150 m of latitude
/// at precision 7, ~600 m at 6) and two spans at the 2-ring bands
/// (~9.8 km at precision 5, ~39 km at 4), which is less than each band's
/// upper radius limit, so entities near the rim of a query can fall
/// outside the covering. Callers filter surviving candidates by exact
/// distance; radial completeness holds only up to the envelope.
pub fn covering_cells(lat: f64, lng: f64, radius_km: f64, max_precision: u8) -> Vec<String> {
    let precision = precision_for_radius(radius_km).min(max_precision);
    let center = encode(lat, lng, precision);

    let ring = neighbors(&center);
    if radius_km <= 3.5 {
        return ring;
    }

    let mut out = ring.clone();
    for cell in &ring {
        for neighbor in neighbors(cell) {
            if !out.contains(&neighbor) {
                out.push(neighbor);
            }
        }
    }
    out
}

/// Great-circle distance between two points in kilometers (Haversine).
///
/// This is the exact check callers apply to the candidate set returned by
/// a proximity query.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}
