// src/models/job.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::driver::LatLng;

/// Where an offer came from. Resolved once when the offer is created,
/// so nothing downstream has to sniff id prefixes.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobSource {
    /// Minted locally by the dispatch simulator; acceptance stays local.
    Simulated,
    /// A real pending booking from the backend; acceptance goes remote.
    #[default]
    Remote,
}

/// Booking lifecycle as the booking API spells it.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    DriverAssigned,  // Accepted, heading to pickup
    ArrivedPickup,   // At the pickup point
    EnRouteToDropoff,// Passenger on board
    Completed,       // Ride finished
}

/// A proposed job awaiting the driver's decision. Immutable once created;
/// leaves the offer queue only on accept or decline.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct JobOffer {
    pub id: String,
    #[serde(default)]
    pub source: JobSource,
    pub pickup_location: String,
    pub destination: String,
    pub pickup_lat: f64,
    pub pickup_lng: f64,
    pub drop_lat: f64,
    pub drop_lng: f64,
    pub passenger_name: String,
    pub passenger_phone: String,
    #[serde(rename = "estimated_cost")]
    pub estimated_fare: f64,
    pub eta_minutes: i64,
    pub distance_km: f64,
    pub passengers: u8,
    pub created_at: DateTime<Utc>,
}

impl JobOffer {
    pub fn pickup(&self) -> LatLng {
        LatLng::new(self.pickup_lat, self.pickup_lng)
    }

    pub fn dropoff(&self) -> LatLng {
        LatLng::new(self.drop_lat, self.drop_lng)
    }
}

/// An accepted offer, actively being executed. Exactly one may be active
/// per session.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Job {
    /// Booking id: server-issued for remote offers, minted locally for
    /// simulated ones.
    pub id: String,
    #[serde(default)]
    pub source: JobSource,
    pub pickup_location: String,
    pub destination: String,
    pub pickup_lat: f64,
    pub pickup_lng: f64,
    pub drop_lat: f64,
    pub drop_lng: f64,
    pub passenger_name: String,
    pub passenger_phone: String,
    #[serde(rename = "estimated_cost")]
    pub estimated_fare: f64,
    pub eta_minutes: i64,
    pub distance_km: f64,
    pub passengers: u8,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
}

impl Job {
    /// Builds the local booking for a simulated offer. Remote offers get
    /// their Job from the accept-job response instead.
    pub fn from_offer(offer: &JobOffer) -> Self {
        Self {
            id: format!("bkg-{}", Uuid::new_v4()),
            source: offer.source,
            pickup_location: offer.pickup_location.clone(),
            destination: offer.destination.clone(),
            pickup_lat: offer.pickup_lat,
            pickup_lng: offer.pickup_lng,
            drop_lat: offer.drop_lat,
            drop_lng: offer.drop_lng,
            passenger_name: offer.passenger_name.clone(),
            passenger_phone: offer.passenger_phone.clone(),
            estimated_fare: offer.estimated_fare,
            eta_minutes: offer.eta_minutes,
            distance_km: offer.distance_km,
            passengers: offer.passengers,
            status: JobStatus::DriverAssigned,
            started_at: Utc::now(),
        }
    }

    pub fn pickup(&self) -> LatLng {
        LatLng::new(self.pickup_lat, self.pickup_lng)
    }

    pub fn dropoff(&self) -> LatLng {
        LatLng::new(self.drop_lat, self.drop_lng)
    }
}

/// Payload for `PUT /bookings/{id}/status`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BookingStatusUpdate {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl BookingStatusUpdate {
    pub fn status_only(status: JobStatus) -> Self {
        Self {
            status,
            actual_cost: None,
            completed_at: None,
        }
    }

    pub fn completed(actual_cost: f64) -> Self {
        Self {
            status: JobStatus::Completed,
            actual_cost: Some(actual_cost),
            completed_at: Some(Utc::now()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_offer() -> JobOffer {
        JobOffer {
            id: "ofr-250815-ab12c".to_string(),
            source: JobSource::Simulated,
            pickup_location: "123 Market St, San Francisco".to_string(),
            destination: "456 Valencia St, San Francisco".to_string(),
            pickup_lat: 37.80,
            pickup_lng: -122.40,
            drop_lat: 37.75,
            drop_lng: -122.45,
            passenger_name: "Jane Smith".to_string(),
            passenger_phone: "+1 (555) 123-4567".to_string(),
            estimated_fare: 32.50,
            eta_minutes: 11,
            distance_km: 7.2,
            passengers: 2,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_job_from_offer_carries_trip_details() {
        let offer = sample_offer();
        let job = Job::from_offer(&offer);

        assert!(job.id.starts_with("bkg-"));
        assert_ne!(job.id, offer.id);
        assert_eq!(job.source, JobSource::Simulated);
        assert_eq!(job.status, JobStatus::DriverAssigned);
        assert_eq!(job.pickup(), offer.pickup());
        assert_eq!(job.dropoff(), offer.dropoff());
        assert_eq!(job.estimated_fare, offer.estimated_fare);
    }

    #[test]
    fn test_offer_wire_names() {
        let offer = sample_offer();
        let json = serde_json::to_value(&offer).unwrap();
        assert_eq!(json["estimated_cost"], 32.50);
        assert_eq!(json["source"], "simulated");

        // Offers parsed from the backend omit the source tag and default
        // to Remote.
        let mut raw = json.clone();
        raw.as_object_mut().unwrap().remove("source");
        let parsed: JobOffer = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.source, JobSource::Remote);
    }

    #[test]
    fn test_booking_status_wire_names() {
        let update = BookingStatusUpdate::status_only(JobStatus::EnRouteToDropoff);
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["status"], "en_route_to_dropoff");
        assert!(json.get("actual_cost").is_none());

        let update = BookingStatusUpdate::completed(98.40);
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["actual_cost"], 98.40);
        assert!(json.get("completed_at").is_some());
    }
}
