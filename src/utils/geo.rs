use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Average urban driving speed used for pickup ETAs
pub const AVERAGE_SPEED_KMH: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        haversine_distance(self.lat, self.lng, other.lat, other.lng)
    }
}

/// Calculate distance between two coordinates using Haversine formula
/// Returns distance in kilometers
pub fn haversine_distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Check if a point is within the given radius of a center
pub fn is_within_radius(point: GeoPoint, center: GeoPoint, max_radius_km: f64) -> bool {
    point.distance_to(&center) <= max_radius_km
}

/// Minutes needed to cover `distance_km` at the average speed, rounded up, never below 1
pub fn eta_minutes(distance_km: f64) -> i64 {
    let minutes = (distance_km / AVERAGE_SPEED_KMH * 60.0).ceil() as i64;
    minutes.max(1)
}

/// A driver that may be matched to a pickup
#[derive(Debug, Clone)]
pub struct DriverCandidate {
    pub driver_id: Uuid,
    pub location: Option<GeoPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverMatch {
    pub driver_id: Uuid,
    pub distance_km: f64,
    pub eta_minutes: i64,
}

/// Find the closest candidate within `max_radius_km` of the pickup.
/// Candidates without a known location are skipped; on ties the earlier candidate wins.
pub fn find_nearest_driver(
    pickup: GeoPoint,
    candidates: &[DriverCandidate],
    max_radius_km: f64,
) -> Option<DriverMatch> {
    let mut best: Option<DriverMatch> = None;

    for candidate in candidates {
        let Some(location) = candidate.location else {
            continue;
        };

        let distance = pickup.distance_to(&location);
        if distance > max_radius_km {
            continue;
        }

        let closer = best
            .as_ref()
            .map_or(true, |current| distance < current.distance_km);
        if closer {
            best = Some(DriverMatch {
                driver_id: candidate.driver_id,
                distance_km: distance,
                eta_minutes: eta_minutes(distance),
            });
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_same_point_is_zero() {
        let kigali = GeoPoint::new(-1.9441, 30.0619);
        assert_eq!(kigali.distance_to(&kigali), 0.0);
    }

    #[test]
    fn test_haversine_short_city_trip() {
        let distance = haversine_distance(-1.9441, 30.0619, -1.9500, 30.0700);
        // About a kilometer across Kigali
        assert!((distance - 1.11).abs() < 0.05, "got {distance}");
    }

    #[test]
    fn test_haversine_jakarta_bandung() {
        let jakarta = (-6.2088, 106.8456);
        let bandung = (-6.9175, 107.6191);

        let distance = haversine_distance(jakarta.0, jakarta.1, bandung.0, bandung.1);
        // Should be approximately 120-130 km
        assert!(distance > 100.0 && distance < 150.0);
    }

    #[test]
    fn test_within_radius() {
        let center = GeoPoint::new(-6.2088, 106.8456);
        let nearby = GeoPoint::new(-6.21, 106.85);

        assert!(is_within_radius(nearby, center, 10.0));

        let far = GeoPoint::new(-6.9175, 107.6191);
        assert!(!is_within_radius(far, center, 10.0));
    }

    #[test]
    fn test_eta_has_one_minute_floor() {
        assert_eq!(eta_minutes(0.0), 1);
        assert_eq!(eta_minutes(0.1), 1);
        // 15 km at 30 km/h
        assert_eq!(eta_minutes(15.0), 30);
        assert_eq!(eta_minutes(15.1), 31);
    }

    #[test]
    fn test_nearest_driver_picks_closest_in_radius() {
        let pickup = GeoPoint::new(-1.9441, 30.0619);
        let far = Uuid::new_v4();
        let near = Uuid::new_v4();
        let offline = Uuid::new_v4();

        let candidates = vec![
            DriverCandidate {
                driver_id: far,
                location: Some(GeoPoint::new(-1.9700, 30.1000)),
            },
            DriverCandidate {
                driver_id: offline,
                location: None,
            },
            DriverCandidate {
                driver_id: near,
                location: Some(GeoPoint::new(-1.9450, 30.0625)),
            },
        ];

        let found = find_nearest_driver(pickup, &candidates, 10.0).unwrap();
        assert_eq!(found.driver_id, near);
        assert_eq!(found.eta_minutes, 1);
    }

    #[test]
    fn test_nearest_driver_respects_radius() {
        let pickup = GeoPoint::new(-1.9441, 30.0619);
        let candidates = vec![DriverCandidate {
            driver_id: Uuid::new_v4(),
            location: Some(GeoPoint::new(-6.2088, 106.8456)),
        }];

        assert!(find_nearest_driver(pickup, &candidates, 10.0).is_none());
        assert!(find_nearest_driver(pickup, &[], 10.0).is_none());
    }

    #[test]
    fn test_nearest_driver_tie_keeps_first() {
        let pickup = GeoPoint::new(0.0, 0.0);
        let first = Uuid::new_v4();
        let candidates = vec![
            DriverCandidate {
                driver_id: first,
                location: Some(GeoPoint::new(0.01, 0.0)),
            },
            DriverCandidate {
                driver_id: Uuid::new_v4(),
                location: Some(GeoPoint::new(-0.01, 0.0)),
            },
        ];

        assert_eq!(
            find_nearest_driver(pickup, &candidates, 5.0).unwrap().driver_id,
            first
        );
    }
}
