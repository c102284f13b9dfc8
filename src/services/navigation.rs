// src/services/navigation.rs
//
// Navigation simulator: while a job is active and the driver is en route,
// steps the driver's position toward the current leg's target every tick
// and mirrors each new position to the backend, fire-and-forget.
use std::sync::Arc;
use tracing;

use crate::{
    models::driver::{LatLng, NavigationStage},
    services::SimulatorHandle,
    services::session::{DriverSession, DriverState, StateEvent},
    utils::geo,
};

fn guard(state: &DriverState) -> bool {
    state.current_job.is_some() && state.stage.is_en_route()
}

fn leg_target(state: &DriverState) -> Option<LatLng> {
    let job = state.current_job.as_ref()?;
    match state.stage {
        NavigationStage::ToPickup => Some(job.pickup()),
        NavigationStage::ToDropoff => Some(job.dropoff()),
        _ => None,
    }
}

/// Spawns the movement task. Same single-timer discipline as dispatch: a
/// leg change or job teardown observed on the snapshot stream discards the
/// pending tick, so no move lands after its guard went false.
pub fn spawn(session: Arc<DriverSession>) -> SimulatorHandle {
    let mut rx = session.subscribe();
    let api = session.api();
    let task = tokio::spawn(async move {
        loop {
            while !guard(&rx.borrow()) {
                if rx.changed().await.is_err() {
                    return;
                }
            }

            let config = session.config();
            let step_deg = config.step_deg;
            let sleep = tokio::time::sleep(config.nav_tick);
            tokio::pin!(sleep);

            loop {
                tokio::select! {
                    _ = &mut sleep => {
                        let state = session.snapshot();
                        if let Some(target) = leg_target(&state) {
                            let next = geo::move_towards(state.location, target, step_deg);
                            tracing::debug!(lat = next.lat, lng = next.lng, "simulated move");
                            session.commit(StateEvent::LocationUpdated(next));

                            // Mirror to the backend without blocking the
                            // simulation; failures are logged only.
                            let api = Arc::clone(&api);
                            tokio::spawn(async move {
                                if let Err(err) = api.update_driver_location(next).await {
                                    tracing::warn!(error = %err, "failed to mirror driver location");
                                }
                            });
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

/// Deep link handed to the platform maps app when the driver prefers
/// external turn-by-turn navigation.
pub fn external_maps_url(origin: LatLng, destination: LatLng) -> String {
    format!(
        "https://www.google.com/maps/dir/?api=1&origin={},{}&destination={},{}&travelmode=driving",
        origin.lat, origin.lng, destination.lat, destination.lng
    )
}
