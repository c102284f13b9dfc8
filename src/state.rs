// src/state.rs
use std::path::PathBuf;
use std::sync::Arc;
use tracing;

use crate::services::{
    SimulatorHandle,
    api_client::{DriverApi, HttpDriverApi, MockDriverApi},
    dispatch, navigation,
    preferences::{FilePreferenceStore, PreferenceStore},
    session::{DriverSession, SimulationConfig, session_rng},
};

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Booking API base URL. When unset the context wires the in-memory
    /// mock API and the whole flow runs offline.
    pub api_base_url: Option<String>,
    pub api_token: Option<String>,
    /// Where the navigation preference survives across sessions.
    pub preference_path: PathBuf,
    pub simulation: SimulationConfig,
    /// Pin for reproducible runs; None seeds from the OS.
    pub rng_seed: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            api_token: None,
            preference_path: PathBuf::from(".riide/nav_pref.json"),
            simulation: SimulationConfig::default(),
            rng_seed: None,
        }
    }
}

/// Single owner of the driver session and its background simulators.
/// Dropping the context tears both simulators down; no timer outlives it.
pub struct AppContext {
    pub session: Arc<DriverSession>,
    _dispatch: SimulatorHandle,
    _navigation: SimulatorHandle,
}

impl AppContext {
    pub async fn new(config: AppConfig) -> Self {
        let api: Arc<dyn DriverApi> = match &config.api_base_url {
            Some(base_url) => Arc::new(HttpDriverApi::new(
                base_url.clone(),
                config.api_token.clone(),
            )),
            None => {
                tracing::warn!("no API base URL configured, using in-memory mock API");
                Arc::new(MockDriverApi::new())
            }
        };
        let preferences: Arc<dyn PreferenceStore> =
            Arc::new(FilePreferenceStore::new(config.preference_path.clone()));

        let session = DriverSession::start(
            api,
            preferences,
            config.simulation.clone(),
            session_rng(config.rng_seed),
        )
        .await;

        let dispatch = dispatch::spawn(Arc::clone(&session), session_rng(config.rng_seed));
        let navigation = navigation::spawn(Arc::clone(&session));

        Self {
            session,
            _dispatch: dispatch,
            _navigation: navigation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_context_wires_mock_api_without_base_url() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            preference_path: dir.path().join("nav_pref.json"),
            rng_seed: Some(1),
            ..AppConfig::default()
        };
        let context = AppContext::new(config).await;

        // Profile fetch against the mock fails, so the fallback profile
        // seeds the session.
        let state = context.session.snapshot();
        assert!(state.profile.is_some());
        assert!(!state.online);
    }
}
