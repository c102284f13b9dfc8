// src/services/session.rs
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tracing;

use crate::{
    errors::{AppError, DriverResult},
    models::driver::{
        DEFAULT_LOCATION, DriverProfile, LatLng, NavigationPreference, NavigationStage,
        StatusUpdate,
    },
    models::job::{BookingStatusUpdate, Job, JobOffer, JobSource, JobStatus},
    services::api_client::DriverApi,
    services::navigation,
    services::preferences::PreferenceStore,
};

/// Tunables shared by the session and both simulators. Production wiring
/// uses the defaults; tests shrink the intervals.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Reference point simulated trips are scattered around.
    pub center: LatLng,
    /// Max coordinate offset from the center, in degrees.
    pub jitter_deg: f64,
    pub offer_interval_min: Duration,
    pub offer_interval_max: Duration,
    pub base_fare: f64,
    pub per_km_rate: f64,
    pub avg_speed_kmh: f64,
    /// Movement simulation tick.
    pub nav_tick: Duration,
    /// Movement step per tick, in degrees on the lat/lng plane.
    pub step_deg: f64,
    /// How long the Complete stage lingers before resetting to Idle.
    pub complete_grace: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            center: DEFAULT_LOCATION,
            jitter_deg: 0.05,
            offer_interval_min: Duration::from_secs(20),
            offer_interval_max: Duration::from_secs(40),
            base_fare: 15.0,
            per_km_rate: 3.0,
            avg_speed_kmh: 40.0,
            nav_tick: Duration::from_secs(3),
            step_deg: 0.0005,
            complete_grace: Duration::from_secs(2),
        }
    }
}

/// Canonical driver-side state. Mutated only through [`DriverState::apply`].
#[derive(Debug, Clone)]
pub struct DriverState {
    pub online: bool,
    pub stage: NavigationStage,
    pub nav_preference: NavigationPreference,
    pub location: LatLng,
    pub current_job: Option<Job>,
    pub job_offers: VecDeque<JobOffer>,
    pub profile: Option<DriverProfile>,
    pub loading: bool,
}

impl Default for DriverState {
    fn default() -> Self {
        Self {
            online: false,
            stage: NavigationStage::Idle,
            nav_preference: NavigationPreference::default(),
            location: DEFAULT_LOCATION,
            current_job: None,
            job_offers: VecDeque::new(),
            profile: None,
            loading: false,
        }
    }
}

/// Named state transitions. Each is applied atomically; the reducer is
/// total and silently ignores events whose preconditions no longer hold,
/// so invariants survive any event order.
#[derive(Debug, Clone)]
pub enum StateEvent {
    SetLoading(bool),
    WentOnline,
    WentOffline,
    ProfileLoaded(DriverProfile),
    LocationUpdated(LatLng),
    OfferReceived(JobOffer),
    OfferRemoved(String),
    JobAccepted { job: Job, offer_id: String },
    ArrivedPickup,
    TripStarted,
    RideCompleted { actual_fare: f64 },
    JobReset { booking_id: String },
    NavPreferenceSet(NavigationPreference),
}

impl DriverState {
    /// Whether a fresh offer may enter the queue right now.
    pub fn can_enqueue(&self, offer: &JobOffer) -> bool {
        self.online
            && self.current_job.is_none()
            && !self.job_offers.iter().any(|o| o.id == offer.id)
    }

    pub fn apply(&mut self, event: StateEvent) {
        match event {
            StateEvent::SetLoading(loading) => self.loading = loading,
            StateEvent::WentOnline => self.online = true,
            StateEvent::WentOffline => {
                self.online = false;
                self.current_job = None;
                self.stage = NavigationStage::Idle;
            }
            StateEvent::ProfileLoaded(profile) => {
                self.online = profile.online;
                if let Some(location) = profile.last_location() {
                    self.location = location;
                }
                self.profile = Some(profile);
            }
            StateEvent::LocationUpdated(location) => self.location = location,
            StateEvent::OfferReceived(offer) => {
                if self.can_enqueue(&offer) {
                    self.job_offers.push_back(offer);
                }
            }
            StateEvent::OfferRemoved(offer_id) => {
                self.job_offers.retain(|o| o.id != offer_id);
            }
            StateEvent::JobAccepted { job, offer_id } => {
                if self.online && self.current_job.is_none() {
                    self.job_offers.retain(|o| o.id != offer_id);
                    self.current_job = Some(job);
                    self.stage = NavigationStage::ToPickup;
                }
            }
            StateEvent::ArrivedPickup => {
                if self.stage == NavigationStage::ToPickup {
                    self.stage = NavigationStage::AtPickup;
                    if let Some(job) = &mut self.current_job {
                        job.status = JobStatus::ArrivedPickup;
                    }
                }
            }
            StateEvent::TripStarted => {
                if self.stage == NavigationStage::AtPickup {
                    self.stage = NavigationStage::ToDropoff;
                    if let Some(job) = &mut self.current_job {
                        job.status = JobStatus::EnRouteToDropoff;
                    }
                }
            }
            StateEvent::RideCompleted { actual_fare } => {
                if self.stage == NavigationStage::ToDropoff {
                    if let Some(job) = &mut self.current_job {
                        job.status = JobStatus::Completed;
                    }
                    self.stage = NavigationStage::Complete;
                    if let Some(profile) = &mut self.profile {
                        profile.total_earnings += actual_fare;
                        profile.total_rides += 1;
                    }
                }
            }
            StateEvent::JobReset { booking_id } => {
                let matches_active = self
                    .current_job
                    .as_ref()
                    .is_some_and(|job| job.id == booking_id);
                if matches_active && self.stage == NavigationStage::Complete {
                    self.current_job = None;
                    self.stage = NavigationStage::Idle;
                }
            }
            StateEvent::NavPreferenceSet(preference) => self.nav_preference = preference,
        }
    }
}

/// The driver session store: canonical state plus the action operations
/// the console calls into. One instance per driver view, owned by the
/// [`crate::state::AppContext`]; simulators subscribe to snapshots via
/// [`DriverSession::subscribe`].
pub struct DriverSession {
    api: Arc<dyn DriverApi>,
    preferences: Arc<dyn PreferenceStore>,
    config: SimulationConfig,
    state: Mutex<DriverState>,
    watch_tx: watch::Sender<DriverState>,
    rng: Mutex<StdRng>,
    // For the delayed post-completion reset task; a Weak so a forgotten
    // timer can never keep the session alive.
    self_weak: Weak<DriverSession>,
}

/// Clears the loading flag when an action finishes, on every exit path.
struct LoadingGuard<'a> {
    session: &'a DriverSession,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.session.commit(StateEvent::SetLoading(false));
    }
}

impl DriverSession {
    /// Builds the session: loads the persisted navigation preference and
    /// the remote profile, falling back to a local demo profile when the
    /// fetch fails so the console works without a backend.
    pub async fn start(
        api: Arc<dyn DriverApi>,
        preferences: Arc<dyn PreferenceStore>,
        config: SimulationConfig,
        rng: StdRng,
    ) -> Arc<Self> {
        let mut initial = DriverState::default();

        match preferences.load().await {
            Ok(Some(preference)) => initial.nav_preference = preference,
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(error = %err, "failed to load navigation preference, using default");
            }
        }

        let profile = match api.get_driver_profile().await {
            Ok(profile) => profile,
            Err(err) => {
                tracing::info!(error = %err, "driver profile unavailable, using local demo profile");
                DriverProfile::fallback()
            }
        };
        initial.apply(StateEvent::ProfileLoaded(profile));

        let (watch_tx, _) = watch::channel(initial.clone());
        Arc::new_cyclic(|self_weak| Self {
            api,
            preferences,
            config,
            state: Mutex::new(initial),
            watch_tx,
            rng: Mutex::new(rng),
            self_weak: self_weak.clone(),
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub(crate) fn api(&self) -> Arc<dyn DriverApi> {
        Arc::clone(&self.api)
    }

    pub fn snapshot(&self) -> DriverState {
        self.state.lock().unwrap().clone()
    }

    /// Snapshot stream for simulators and UI. Every committed transition
    /// publishes a fresh snapshot.
    pub fn subscribe(&self) -> watch::Receiver<DriverState> {
        self.watch_tx.subscribe()
    }

    /// Applies one event atomically and publishes the resulting snapshot.
    pub(crate) fn commit(&self, event: StateEvent) -> DriverState {
        let mut state = self.state.lock().unwrap();
        state.apply(event);
        let snapshot = state.clone();
        drop(state);
        self.watch_tx.send_replace(snapshot.clone());
        snapshot
    }

    /// Gates top-level actions: at most one may be in flight.
    fn begin_action(&self) -> DriverResult<LoadingGuard<'_>> {
        let mut state = self.state.lock().unwrap();
        if state.loading {
            return Err(AppError::invalid_transition("another action is in flight"));
        }
        state.loading = true;
        let snapshot = state.clone();
        drop(state);
        self.watch_tx.send_replace(snapshot);
        Ok(LoadingGuard { session: self })
    }

    /// Flips the driver online. The status persistence call is tolerated:
    /// on failure the driver still goes online locally, offline-first.
    pub async fn go_online(&self) -> DriverResult<()> {
        let _guard = self.begin_action()?;
        let snapshot = self.snapshot();

        tracing::info!("driver going online");
        if let Err(err) = self
            .api
            .update_driver_status(StatusUpdate::online_at(snapshot.location))
            .await
        {
            tracing::warn!(error = %err, "status update failed, going online locally");
        }

        self.commit(StateEvent::WentOnline);
        Ok(())
    }

    /// Flips the driver offline and abandons any active job. The status
    /// persistence call is surfaced: on failure nothing changes locally,
    /// otherwise the backend would keep dispatching to a gone driver.
    pub async fn go_offline(&self) -> DriverResult<()> {
        let _guard = self.begin_action()?;

        tracing::info!("driver going offline");
        if let Err(err) = self.api.update_driver_status(StatusUpdate::offline()).await {
            tracing::error!(error = %err, "failed to go offline");
            return Err(err);
        }

        self.commit(StateEvent::WentOffline);
        Ok(())
    }

    /// Accepts a pending offer. Simulated offers mint a local booking;
    /// remote offers go through the accept-job endpoint. Failure is
    /// surfaced and leaves the offer in the queue.
    pub async fn accept_offer(&self, offer_id: &str) -> DriverResult<Job> {
        let _guard = self.begin_action()?;
        let snapshot = self.snapshot();

        if offer_id.trim().is_empty() {
            return Err(AppError::validation_error("offer_id", "must not be empty"));
        }
        if !snapshot.online {
            return Err(AppError::invalid_transition("driver is offline"));
        }
        if snapshot.current_job.is_some() {
            return Err(AppError::invalid_transition("a job is already active"));
        }
        let offer = snapshot
            .job_offers
            .iter()
            .find(|o| o.id == offer_id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("offer {}", offer_id)))?;

        let job = match offer.source {
            JobSource::Simulated => Job::from_offer(&offer),
            JobSource::Remote => match self.api.accept_job(&offer.id).await {
                Ok(job) => job,
                Err(err) => {
                    tracing::error!(offer_id = %offer.id, error = %err, "failed to accept job");
                    return Err(err);
                }
            },
        };

        tracing::info!(booking_id = %job.id, "job accepted, heading to pickup");
        let state = self.commit(StateEvent::JobAccepted {
            job: job.clone(),
            offer_id: offer.id.clone(),
        });
        self.announce_navigation(&state, job.pickup());
        Ok(job)
    }

    /// Declines a pending offer. Local only.
    pub fn decline_offer(&self, offer_id: &str) -> DriverResult<()> {
        let mut state = self.state.lock().unwrap();
        if !state.job_offers.iter().any(|o| o.id == offer_id) {
            return Err(AppError::not_found(format!("offer {}", offer_id)));
        }
        state.apply(StateEvent::OfferRemoved(offer_id.to_string()));
        let snapshot = state.clone();
        drop(state);
        self.watch_tx.send_replace(snapshot);
        tracing::info!(offer_id, "offer declined");
        Ok(())
    }

    /// Marks arrival at the pickup point. Persistence failure is
    /// tolerated.
    pub async fn mark_arrived_pickup(&self) -> DriverResult<()> {
        let snapshot = self.snapshot();
        let job = snapshot
            .current_job
            .as_ref()
            .ok_or_else(|| AppError::invalid_transition("no active job"))?;
        if snapshot.stage != NavigationStage::ToPickup {
            return Err(AppError::invalid_transition("not en route to pickup"));
        }

        if let Err(err) = self
            .api
            .update_booking_status(
                &job.id,
                BookingStatusUpdate::status_only(JobStatus::ArrivedPickup),
            )
            .await
        {
            tracing::warn!(booking_id = %job.id, error = %err, "failed to persist pickup arrival");
        }

        self.commit(StateEvent::ArrivedPickup);
        tracing::info!(booking_id = %job.id, "arrived at pickup, waiting for passenger");
        Ok(())
    }

    /// Starts the trip leg to the dropoff. Persistence failure is
    /// tolerated.
    pub async fn start_to_dropoff(&self) -> DriverResult<()> {
        let snapshot = self.snapshot();
        let job = snapshot
            .current_job
            .as_ref()
            .ok_or_else(|| AppError::invalid_transition("no active job"))?;
        if snapshot.stage != NavigationStage::AtPickup {
            return Err(AppError::invalid_transition("not waiting at pickup"));
        }

        if let Err(err) = self
            .api
            .update_booking_status(
                &job.id,
                BookingStatusUpdate::status_only(JobStatus::EnRouteToDropoff),
            )
            .await
        {
            tracing::warn!(booking_id = %job.id, error = %err, "failed to persist trip start");
        }

        let state = self.commit(StateEvent::TripStarted);
        self.announce_navigation(&state, job.dropoff());
        tracing::info!(booking_id = %job.id, "trip started, heading to dropoff");
        Ok(())
    }

    /// Completes the ride. The actual fare applies a bounded random
    /// variation to the estimate; the local profile credit and stage
    /// change happen optimistically even when the persistence call fails,
    /// but that failure is surfaced to the caller.
    pub async fn complete_ride(&self) -> DriverResult<f64> {
        let _guard = self.begin_action()?;
        let snapshot = self.snapshot();
        let job = snapshot
            .current_job
            .as_ref()
            .ok_or_else(|| AppError::invalid_transition("no active job"))?;
        if snapshot.stage != NavigationStage::ToDropoff {
            return Err(AppError::invalid_transition("ride is not en route to dropoff"));
        }

        let actual_fare = self.settle_fare(job.estimated_fare);
        let remote = self
            .api
            .update_booking_status(&job.id, BookingStatusUpdate::completed(actual_fare))
            .await;

        self.commit(StateEvent::RideCompleted { actual_fare });
        tracing::info!(booking_id = %job.id, fare = actual_fare, "ride completed");
        self.schedule_job_reset(job.id.clone());

        match remote {
            Ok(()) => Ok(actual_fare),
            Err(err) => {
                tracing::error!(booking_id = %job.id, error = %err, "failed to persist ride completion");
                Err(err)
            }
        }
    }

    /// Switches the navigation preference and writes it through to
    /// durable storage. A storage failure keeps the in-memory change.
    pub async fn set_navigation_preference(
        &self,
        preference: NavigationPreference,
    ) -> DriverResult<()> {
        self.commit(StateEvent::NavPreferenceSet(preference));
        if let Err(err) = self.preferences.save(preference).await {
            tracing::warn!(error = %err, "failed to persist navigation preference");
        }
        Ok(())
    }

    /// Pulls pending remote bookings into the offer queue, skipping
    /// duplicates and anything matching the active booking. Returns how
    /// many offers were added.
    pub async fn refresh_available_jobs(&self) -> DriverResult<usize> {
        let offers = self.api.get_available_jobs().await?;

        let mut state = self.state.lock().unwrap();
        let mut added = 0;
        for offer in offers {
            let is_active = state
                .current_job
                .as_ref()
                .is_some_and(|job| job.id == offer.id);
            if !is_active && state.can_enqueue(&offer) {
                state.apply(StateEvent::OfferReceived(offer));
                added += 1;
            }
        }
        let snapshot = state.clone();
        drop(state);
        self.watch_tx.send_replace(snapshot);

        tracing::debug!(added, "available jobs refreshed");
        Ok(added)
    }

    /// Entry point for the dispatch simulator.
    pub(crate) fn offer_job(&self, offer: JobOffer) {
        tracing::debug!(offer_id = %offer.id, fare = offer.estimated_fare, "job offer received");
        self.commit(StateEvent::OfferReceived(offer));
    }

    /// Fare reconciliation: uniform ±5% around the estimate, rounded to
    /// cents. The rng is injected so tests pin a seed.
    fn settle_fare(&self, estimate: f64) -> f64 {
        let factor = self.rng.lock().unwrap().random_range(0.95..=1.05);
        (estimate * factor * 100.0).round() / 100.0
    }

    fn schedule_job_reset(&self, booking_id: String) {
        let Some(session) = self.self_weak.upgrade() else {
            return;
        };
        let grace = self.config.complete_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            session.commit(StateEvent::JobReset { booking_id });
        });
    }

    fn announce_navigation(&self, state: &DriverState, target: LatLng) {
        if state.nav_preference == NavigationPreference::ExternalMaps {
            let url = navigation::external_maps_url(state.location, target);
            tracing::info!(%url, "opening external navigation");
        }
    }
}

/// Deterministic rng constructor for wiring code.
pub fn session_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}
