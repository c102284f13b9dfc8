use std::sync::Arc;
use std::time::Duration;

use riide_driver::{
    models::driver::NavigationStage,
    state::{AppConfig, AppContext},
    SimulationConfig,
};

/// Console demo: wires the session against the in-memory mock API, goes
/// online, lets the dispatch simulator produce an offer, then drives one
/// ride end to end and goes back offline.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = AppConfig {
        simulation: SimulationConfig {
            offer_interval_min: Duration::from_secs(3),
            offer_interval_max: Duration::from_secs(6),
            nav_tick: Duration::from_secs(1),
            step_deg: 0.005,
            ..SimulationConfig::default()
        },
        ..AppConfig::default()
    };

    let context = AppContext::new(config).await;
    let session = Arc::clone(&context.session);
    let mut rx = session.subscribe();

    session.go_online().await.unwrap();

    let mut ride_completed = false;
    loop {
        rx.changed().await.unwrap();
        let state = rx.borrow().clone();
        if state.loading {
            continue;
        }

        if let Some(job) = &state.current_job {
            match state.stage {
                NavigationStage::ToPickup if state.location == job.pickup() => {
                    session.mark_arrived_pickup().await.unwrap();
                }
                NavigationStage::AtPickup => {
                    session.start_to_dropoff().await.unwrap();
                }
                NavigationStage::ToDropoff if state.location == job.dropoff() => {
                    let fare = session.complete_ride().await.unwrap();
                    tracing::info!(fare, "demo ride settled");
                    ride_completed = true;
                }
                _ => {}
            }
        } else if ride_completed {
            session.go_offline().await.unwrap();
            break;
        } else if let Some(offer) = state.job_offers.front() {
            let offer_id = offer.id.clone();
            session.accept_offer(&offer_id).await.unwrap();
        }
    }

    tracing::info!("driver back offline, demo finished");
}
