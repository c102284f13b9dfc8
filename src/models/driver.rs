// src/models/driver.rs
use serde::{Deserialize, Serialize};

/// A plain latitude/longitude pair in decimal degrees.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Reference point used when nothing better is known: downtown San Francisco.
pub const DEFAULT_LOCATION: LatLng = LatLng {
    lat: 37.7749,
    lng: -122.4194,
};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    Offline, // Driver is not available for work
    Online,  // Driver is available, accepting job offers
}

/// Current leg of an active job.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum NavigationStage {
    Idle,      // No active job
    ToPickup,  // Driving to the passenger
    AtPickup,  // Waiting at the pickup point
    ToDropoff, // Passenger on board, driving to destination
    Complete,  // Ride finished, transient before reset to Idle
}

impl NavigationStage {
    /// Stages during which the movement simulation runs.
    pub fn is_en_route(&self) -> bool {
        matches!(self, NavigationStage::ToPickup | NavigationStage::ToDropoff)
    }
}

/// How the driver wants turn-by-turn directions delivered. Persisted
/// across sessions via the preference store.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum NavigationPreference {
    #[default]
    ExternalMaps,
    InApp,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DriverProfile {
    pub id: String,
    pub user_id: String,
    pub license_number: String,
    pub rating: f32,          // Average rating (0-5)
    pub total_rides: u32,     // Monotonically non-decreasing
    pub total_earnings: f64,  // Monotonically non-decreasing
    #[serde(rename = "driver_online")]
    pub online: bool,
    pub current_lat: Option<f64>,
    pub current_lng: Option<f64>,
}

impl DriverProfile {
    /// Locally synthesized stand-in used when the remote profile fetch
    /// fails, so the driver flow stays exercisable without a backend.
    pub fn fallback() -> Self {
        Self {
            id: "drv-local-demo".to_string(),
            user_id: "usr-local-demo".to_string(),
            license_number: "DL123456789".to_string(),
            rating: 4.9,
            total_rides: 156,
            total_earnings: 2847.50,
            online: false,
            current_lat: Some(DEFAULT_LOCATION.lat),
            current_lng: Some(DEFAULT_LOCATION.lng),
        }
    }

    pub fn last_location(&self) -> Option<LatLng> {
        match (self.current_lat, self.current_lng) {
            (Some(lat), Some(lng)) => Some(LatLng::new(lat, lng)),
            _ => None,
        }
    }
}

/// Payload for `PUT /drivers/status`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StatusUpdate {
    #[serde(rename = "driver_online")]
    pub online: bool,
    pub status: DriverStatus,
    #[serde(rename = "current_lat", skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(rename = "current_lng", skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
}

impl StatusUpdate {
    pub fn online_at(location: LatLng) -> Self {
        Self {
            online: true,
            status: DriverStatus::Online,
            lat: Some(location.lat),
            lng: Some(location.lng),
        }
    }

    pub fn offline() -> Self {
        Self {
            online: false,
            status: DriverStatus::Offline,
            lat: None,
            lng: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_profile_is_offline() {
        let profile = DriverProfile::fallback();
        assert!(!profile.online);
        assert_eq!(profile.last_location(), Some(DEFAULT_LOCATION));
    }

    #[test]
    fn test_navigation_preference_wire_names() {
        let json = serde_json::to_string(&NavigationPreference::ExternalMaps).unwrap();
        assert_eq!(json, "\"external_maps\"");
        let parsed: NavigationPreference = serde_json::from_str("\"in_app\"").unwrap();
        assert_eq!(parsed, NavigationPreference::InApp);
    }

    #[test]
    fn test_status_update_serialization() {
        let update = StatusUpdate::offline();
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["driver_online"], false);
        assert_eq!(json["status"], "offline");
        assert!(json.get("current_lat").is_none());

        let update = StatusUpdate::online_at(DEFAULT_LOCATION);
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["current_lat"], DEFAULT_LOCATION.lat);
    }
}
