//! Great-circle distance between reported issues and a query point.

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine great-circle distance between two lat/lng points in kilometers.
///
/// Inputs are degrees. Range checking is the caller's job; the result is
/// always `>= 0` and symmetric in its two points.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let lat1_r = lat1.to_radians();
    let lat2_r = lat2.to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1_r.cos() * lat2_r.cos() * (d_lng / 2.0).sin().powi(2);
    // Rounding can push `a` a hair past 1.0 for antipodal points.
    let c = 2.0 * a.sqrt().min(1.0).asin();
    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_points_are_zero_apart() {
        assert_eq!(haversine_km(18.5211, 73.8502, 18.5211, 73.8502), 0.0);
        assert_eq!(haversine_km(-90.0, 180.0, -90.0, 180.0), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            (18.5211, 73.8502, 18.5304, 73.8567),
            (44.96, -93.27, 44.94, -93.09),
            (-33.8688, 151.2093, 51.5074, -0.1278),
            (0.0, -179.9, 0.0, 179.9),
        ];
        for (lat1, lng1, lat2, lng2) in pairs {
            let ab = haversine_km(lat1, lng1, lat2, lng2);
            let ba = haversine_km(lat2, lng2, lat1, lng1);
            assert!((ab - ba).abs() < 1e-9, "{ab} != {ba}");
        }
    }

    #[test]
    fn one_degree_of_latitude() {
        let d = haversine_km(10.0, 20.0, 11.0, 20.0);
        assert!((d - 111.195).abs() < 0.01, "Expected ~111.195 km, got {d}");
    }

    #[test]
    fn short_hop_inside_pune() {
        let d = haversine_km(18.5211, 73.8502, 18.5304, 73.8567);
        assert!((d - 1.24).abs() < 0.05, "Expected ~1.24 km, got {d}");
    }

    #[test]
    fn crosses_the_antimeridian() {
        let d = haversine_km(0.0, -179.9, 0.0, 179.9);
        assert!(d < 25.0, "Expected ~22 km across the antimeridian, got {d}");
    }

    #[test]
    fn antipodal_points_are_half_the_circumference() {
        let d = haversine_km(0.0, 0.0, 0.0, 180.0);
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }
}
