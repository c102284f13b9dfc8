// src/services/api_client.rs
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Mutex;
use tracing;

use crate::{
    errors::{AppError, DriverResult},
    models::driver::{DriverProfile, LatLng, StatusUpdate},
    models::job::{BookingStatusUpdate, Job, JobOffer, JobStatus},
};

/// Remote collaborator that persists driver status, location and booking
/// transitions. The session store only ever talks to this trait; tests and
/// the offline demo plug in [`MockDriverApi`].
#[async_trait]
pub trait DriverApi: Send + Sync {
    async fn get_driver_profile(&self) -> DriverResult<DriverProfile>;
    async fn update_driver_status(&self, update: StatusUpdate) -> DriverResult<()>;
    async fn update_driver_location(&self, location: LatLng) -> DriverResult<()>;
    async fn get_available_jobs(&self) -> DriverResult<Vec<JobOffer>>;
    async fn accept_job(&self, booking_id: &str) -> DriverResult<Job>;
    async fn update_booking_status(
        &self,
        booking_id: &str,
        update: BookingStatusUpdate,
    ) -> DriverResult<()>;
}

/// Response envelope the booking API wraps every payload in.
#[derive(Debug, Serialize, Deserialize)]
struct ApiEnvelope<T> {
    success: bool,
    message: String,
    data: Option<T>,
}

/// reqwest-backed client for the booking API.
pub struct HttpDriverApi {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpDriverApi {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token,
            client: reqwest::Client::new(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.client.request(method, url);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn unwrap_envelope<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> DriverResult<ApiEnvelope<T>> {
        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| status.to_string());
            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(AppError::unauthorized(message));
            }
            return Err(AppError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ApiEnvelope<T> = response.json().await?;
        if !envelope.success {
            return Err(AppError::Http {
                status: status.as_u16(),
                message: envelope.message,
            });
        }
        Ok(envelope)
    }

    async fn expect_data<T: DeserializeOwned>(response: reqwest::Response) -> DriverResult<T> {
        let envelope = Self::unwrap_envelope::<T>(response).await?;
        envelope
            .data
            .ok_or_else(|| AppError::not_found(envelope.message))
    }

    async fn expect_ack(response: reqwest::Response) -> DriverResult<()> {
        Self::unwrap_envelope::<serde_json::Value>(response).await?;
        Ok(())
    }
}

#[async_trait]
impl DriverApi for HttpDriverApi {
    async fn get_driver_profile(&self) -> DriverResult<DriverProfile> {
        let response = self
            .request(reqwest::Method::GET, "/drivers/profile")
            .send()
            .await?;
        Self::expect_data(response).await
    }

    async fn update_driver_status(&self, update: StatusUpdate) -> DriverResult<()> {
        let response = self
            .request(reqwest::Method::PUT, "/drivers/status")
            .json(&update)
            .send()
            .await?;
        Self::expect_ack(response).await
    }

    async fn update_driver_location(&self, location: LatLng) -> DriverResult<()> {
        let body = serde_json::json!({
            "current_lat": location.lat,
            "current_lng": location.lng,
        });
        let response = self
            .request(reqwest::Method::PUT, "/drivers/location")
            .json(&body)
            .send()
            .await?;
        Self::expect_ack(response).await
    }

    async fn get_available_jobs(&self) -> DriverResult<Vec<JobOffer>> {
        let response = self
            .request(reqwest::Method::GET, "/drivers/available-jobs")
            .send()
            .await?;
        Self::expect_data(response).await
    }

    async fn accept_job(&self, booking_id: &str) -> DriverResult<Job> {
        let body = serde_json::json!({ "booking_id": booking_id });
        let response = self
            .request(reqwest::Method::POST, "/drivers/accept-job")
            .json(&body)
            .send()
            .await?;
        Self::expect_data(response).await
    }

    async fn update_booking_status(
        &self,
        booking_id: &str,
        update: BookingStatusUpdate,
    ) -> DriverResult<()> {
        let path = format!("/bookings/{}/status", booking_id);
        let response = self
            .request(reqwest::Method::PUT, &path)
            .json(&update)
            .send()
            .await?;
        Self::expect_ack(response).await
    }
}

/// Everything the mock records about outgoing calls, so tests can assert
/// on exactly what was persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Profile,
    Status { online: bool },
    Location(LatLng),
    AvailableJobs,
    AcceptJob(String),
    BookingStatus { booking_id: String, status: JobStatus },
}

/// In-memory stand-in for the booking API. Per-operation failure toggles
/// model a flaky or absent backend.
#[derive(Default)]
pub struct MockDriverApi {
    pub profile: Mutex<Option<DriverProfile>>,
    pub available_jobs: Mutex<Vec<JobOffer>>,
    failing: Mutex<HashSet<&'static str>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockDriverApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(profile: DriverProfile) -> Self {
        let api = Self::default();
        *api.profile.lock().unwrap() = Some(profile);
        api
    }

    /// Make one operation fail until cleared. Known names: "profile",
    /// "status", "location", "available_jobs", "accept_job",
    /// "booking_status".
    pub fn fail(&self, operation: &'static str) {
        self.failing.lock().unwrap().insert(operation);
    }

    pub fn recover(&self, operation: &'static str) {
        self.failing.lock().unwrap().remove(operation);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, matcher: impl Fn(&RecordedCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| matcher(c)).count()
    }

    fn check(&self, operation: &'static str) -> DriverResult<()> {
        if self.failing.lock().unwrap().contains(operation) {
            tracing::debug!(operation, "mock api returning injected failure");
            return Err(AppError::Network(format!(
                "injected failure for {}",
                operation
            )));
        }
        Ok(())
    }

    fn record(&self, call: RecordedCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl DriverApi for MockDriverApi {
    async fn get_driver_profile(&self) -> DriverResult<DriverProfile> {
        self.record(RecordedCall::Profile);
        self.check("profile")?;
        self.profile
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AppError::not_found("driver profile"))
    }

    async fn update_driver_status(&self, update: StatusUpdate) -> DriverResult<()> {
        self.record(RecordedCall::Status {
            online: update.online,
        });
        self.check("status")
    }

    async fn update_driver_location(&self, location: LatLng) -> DriverResult<()> {
        self.record(RecordedCall::Location(location));
        self.check("location")
    }

    async fn get_available_jobs(&self) -> DriverResult<Vec<JobOffer>> {
        self.record(RecordedCall::AvailableJobs);
        self.check("available_jobs")?;
        Ok(self.available_jobs.lock().unwrap().clone())
    }

    async fn accept_job(&self, booking_id: &str) -> DriverResult<Job> {
        self.record(RecordedCall::AcceptJob(booking_id.to_string()));
        self.check("accept_job")?;

        let offers = self.available_jobs.lock().unwrap();
        let offer = offers
            .iter()
            .find(|o| o.id == booking_id)
            .ok_or_else(|| AppError::not_found(format!("booking {}", booking_id)))?;
        Ok(Job::from_offer(offer))
    }

    async fn update_booking_status(
        &self,
        booking_id: &str,
        update: BookingStatusUpdate,
    ) -> DriverResult<()> {
        self.record(RecordedCall::BookingStatus {
            booking_id: booking_id.to_string(),
            status: update.status,
        });
        self.check("booking_status")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::driver::DriverProfile;

    #[tokio::test]
    async fn test_mock_profile_not_found_by_default() {
        let api = MockDriverApi::new();
        let err = api.get_driver_profile().await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_mock_failure_injection_and_recovery() {
        let api = MockDriverApi::with_profile(DriverProfile::fallback());

        api.fail("status");
        let err = api
            .update_driver_status(StatusUpdate::offline())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Network(_)));

        api.recover("status");
        api.update_driver_status(StatusUpdate::offline())
            .await
            .unwrap();

        // Both attempts were recorded, failed or not.
        assert_eq!(
            api.call_count(|c| matches!(c, RecordedCall::Status { .. })),
            2
        );
    }
}
