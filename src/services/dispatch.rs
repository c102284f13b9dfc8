// src/services/dispatch.rs
//
// Dispatch simulator: while the driver is online with no active job,
// periodically synthesizes a job offer and hands it to the session. Stands
// in for the real matching backend, which never reaches this client.
use chrono::Utc;
use rand::{Rng, rngs::StdRng};
use std::sync::Arc;
use std::time::Duration;
use tracing;

use crate::{
    models::driver::LatLng,
    models::job::{JobOffer, JobSource},
    services::SimulatorHandle,
    services::session::{DriverSession, DriverState, SimulationConfig},
    utils::geo,
    utils::id_generator::{IdGenerator, IdType},
};

const PASSENGER_ROSTER: [&str; 4] = ["John Doe", "Jane Smith", "Mike Johnson", "Sarah Wilson"];

fn guard(state: &DriverState) -> bool {
    state.online && state.current_job.is_none()
}

/// Spawns the offer-generation task. At most one timer is ever armed: the
/// task sleeps out one inter-arrival interval while watching for state
/// changes, and any change that falsifies the guard discards the pending
/// timer before it can fire.
pub fn spawn(session: Arc<DriverSession>, mut rng: StdRng) -> SimulatorHandle {
    let mut rx = session.subscribe();
    let task = tokio::spawn(async move {
        loop {
            // Park until the driver is online and idle.
            while !guard(&rx.borrow()) {
                if rx.changed().await.is_err() {
                    return;
                }
            }

            let wait = sample_interval(session.config(), &mut rng);
            tracing::debug!(wait_ms = wait.as_millis() as u64, "next simulated offer scheduled");
            let sleep = tokio::time::sleep(wait);
            tokio::pin!(sleep);

            loop {
                tokio::select! {
                    _ = &mut sleep => {
                        if guard(&rx.borrow()) {
                            let offer = synthesize_offer(session.config(), &mut rng);
                            session.offer_job(offer);
                        }
                        break;
                    }
                    changed = rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        if !guard(&rx.borrow()) {
                            break;
                        }
                    }
                }
            }
        }
    });
    SimulatorHandle::new(task)
}

fn sample_interval(config: &SimulationConfig, rng: &mut StdRng) -> Duration {
    let min = config.offer_interval_min.as_millis() as u64;
    let max = config.offer_interval_max.as_millis() as u64;
    if max > min {
        Duration::from_millis(rng.random_range(min..=max))
    } else {
        Duration::from_millis(min)
    }
}

fn jittered_point(config: &SimulationConfig, rng: &mut StdRng) -> LatLng {
    let j = config.jitter_deg;
    LatLng::new(
        config.center.lat + rng.random_range(-j..=j),
        config.center.lng + rng.random_range(-j..=j),
    )
}

/// One randomized offer: pickup/dropoff scattered around the center,
/// great-circle distance, ETA at the assumed average speed, and a linear
/// fare over distance plus the base fare.
pub fn synthesize_offer(config: &SimulationConfig, rng: &mut StdRng) -> JobOffer {
    let pickup = jittered_point(config, rng);
    let dropoff = jittered_point(config, rng);

    let distance_km = geo::haversine_km(pickup, dropoff);
    let eta_minutes = geo::eta_minutes(distance_km, config.avg_speed_kmh);
    let estimated_fare =
        ((config.base_fare + config.per_km_rate * distance_km) * 100.0).round() / 100.0;

    JobOffer {
        id: IdGenerator::generate(IdType::Offer),
        source: JobSource::Simulated,
        pickup_location: format!("{} Street, San Francisco", rng.random_range(1..10_000)),
        destination: format!("{} Ave, San Francisco", rng.random_range(1..10_000)),
        pickup_lat: pickup.lat,
        pickup_lng: pickup.lng,
        drop_lat: dropoff.lat,
        drop_lng: dropoff.lng,
        passenger_name: PASSENGER_ROSTER[rng.random_range(0..PASSENGER_ROSTER.len())].to_string(),
        passenger_phone: "+1 (555) 123-4567".to_string(),
        estimated_fare,
        eta_minutes,
        distance_km: (distance_km * 10.0).round() / 10.0,
        passengers: rng.random_range(1..=4),
        created_at: Utc::now(),
    }
}
