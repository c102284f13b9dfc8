// src/utils/geo.rs
use crate::models::driver::LatLng;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points, haversine formula.
pub fn haversine_km(a: LatLng, b: LatLng) -> f64 {
    let lat1_rad = a.lat.to_radians();
    let lat2_rad = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Trip ETA in whole minutes at an assumed average speed.
pub fn eta_minutes(distance_km: f64, avg_speed_kmh: f64) -> i64 {
    ((distance_km / avg_speed_kmh) * 60.0).round() as i64
}

/// One simulated movement step toward a target.
///
/// Works on the flat lat/lng plane with a degree-valued step, matching the
/// movement simulation's coordinate granularity; haversine is only for
/// fares and ETAs. Snaps to the target once the remaining planar distance
/// is under one step, otherwise advances exactly `step_deg` along the
/// straight line.
pub fn move_towards(current: LatLng, target: LatLng, step_deg: f64) -> LatLng {
    let lat_diff = target.lat - current.lat;
    let lng_diff = target.lng - current.lng;

    let distance = (lat_diff * lat_diff + lng_diff * lng_diff).sqrt();
    if distance < step_deg {
        return target;
    }

    let ratio = step_deg / distance;
    LatLng::new(
        current.lat + lat_diff * ratio,
        current.lng + lng_diff * ratio,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn planar_distance(a: LatLng, b: LatLng) -> f64 {
        ((a.lat - b.lat).powi(2) + (a.lng - b.lng).powi(2)).sqrt()
    }

    #[test]
    fn test_haversine_symmetric_and_zero() {
        let sf = LatLng::new(37.7749, -122.4194);
        let oak = LatLng::new(37.8044, -122.2712);

        assert!((haversine_km(sf, oak) - haversine_km(oak, sf)).abs() < EPS);
        assert!(haversine_km(sf, sf).abs() < EPS);
    }

    #[test]
    fn test_haversine_known_distance() {
        // SF to Oakland city hall is roughly 13.5 km as the crow flies.
        let sf = LatLng::new(37.7749, -122.4194);
        let oak = LatLng::new(37.8044, -122.2712);
        let d = haversine_km(sf, oak);
        assert!(d > 12.0 && d < 15.0, "unexpected distance: {}", d);
    }

    #[test]
    fn test_eta_rounds_to_nearest_minute() {
        // 10 km at 40 km/h = 15 minutes exactly
        assert_eq!(eta_minutes(10.0, 40.0), 15);
        // 7.2 km at 40 km/h = 10.8 minutes, rounds to 11
        assert_eq!(eta_minutes(7.2, 40.0), 11);
        assert_eq!(eta_minutes(0.0, 40.0), 0);
    }

    #[test]
    fn test_move_towards_snaps_within_one_step() {
        let current = LatLng::new(37.7749, -122.4194);
        let target = LatLng::new(37.7751, -122.4195);
        let moved = move_towards(current, target, 0.01);
        assert_eq!(moved, target);
    }

    #[test]
    fn test_move_towards_advances_exactly_one_step() {
        let current = LatLng::new(37.7749, -122.4194);
        let target = LatLng::new(37.80, -122.40);
        let step = 0.0005;

        let moved = move_towards(current, target, step);
        assert!((planar_distance(current, moved) - step).abs() < EPS);
        assert!(planar_distance(moved, target) < planar_distance(current, target));
    }

    #[test]
    fn test_move_towards_converges() {
        let mut current = LatLng::new(37.7749, -122.4194);
        let target = LatLng::new(37.78, -122.41);
        let step = 0.0005;

        let mut last = planar_distance(current, target);
        for _ in 0..100 {
            current = move_towards(current, target, step);
            let d = planar_distance(current, target);
            assert!(d < last || current == target);
            last = d;
            if current == target {
                break;
            }
        }
        assert_eq!(current, target);
    }
}
