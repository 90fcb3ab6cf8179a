//! Geometry helpers shared by the post-processor and extrapolator (§4.D, §4.E.1).

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two WGS-84 points, in meters.
pub fn haversine_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let (lat1, lat2) = (lat1.to_radians(), lat2.to_radians());
    let dlat = lat2 - lat1;
    let dlng = (lng2 - lng1).to_radians();
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_M * c
}

/// Initial bearing (degrees, 0–360) from point 1 to point 2.
pub fn bearing_deg(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let (lat1r, lat2r) = (lat1.to_radians(), lat2.to_radians());
    let dlng = (lng2 - lng1).to_radians();
    let y = dlng.sin() * lat2r.cos();
    let x = lat1r.cos() * lat2r.sin() - lat1r.sin() * lat2r.cos() * dlng.cos();
    let deg = y.atan2(x).to_degrees();
    (deg + 360.0) % 360.0
}

/// Flat-Earth position advance used by the extrapolator (§4.E.1): `dist` in nautical miles,
/// `bearing_deg` the new track.
pub fn flat_earth_advance(lat: f64, lng: f64, dist_nm: f64, bearing_deg: f64) -> (f64, f64) {
    let bearing = bearing_deg.to_radians();
    let dlat = dist_nm * bearing.cos() / 60.0;
    let dlng = dist_nm * bearing.sin() / (60.0 * lat.to_radians().cos());
    (lat + dlat, lng + dlng)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_zero_for_same_point() {
        assert_eq!(haversine_m(43.99, -88.56, 43.99, -88.56), 0.0);
    }

    #[test]
    fn haversine_roughly_matches_known_distance() {
        // Madison, WI to Milwaukee, WI is roughly 120 km.
        let d = haversine_m(43.0731, -89.4012, 43.0389, -87.9065);
        assert!((100_000.0..140_000.0).contains(&d), "got {d}");
    }

    #[test]
    fn flat_earth_advance_east_increases_longitude() {
        let (_, lng2) = flat_earth_advance(43.99, -88.56, 2.0, 90.0);
        assert!(lng2 > -88.56);
    }
}
