// src/services/preferences.rs
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing;

use crate::{errors::DriverResult, models::driver::NavigationPreference};

/// Durable storage for the one piece of session state that survives
/// restarts: the navigation preference. Read once at session start,
/// overwritten on every change.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn load(&self) -> DriverResult<Option<NavigationPreference>>;
    async fn save(&self, preference: NavigationPreference) -> DriverResult<()>;
}

/// One-entry JSON file on disk.
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PreferenceStore for FilePreferenceStore {
    async fn load(&self) -> DriverResult<Option<NavigationPreference>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let preference = serde_json::from_str(&contents)?;
                Ok(Some(preference))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, preference: NavigationPreference) -> DriverResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string(&preference)?;
        tokio::fs::write(&self.path, contents).await?;
        tracing::debug!(?preference, "navigation preference persisted");
        Ok(())
    }
}

/// In-memory store for tests and the offline demo.
#[derive(Default)]
pub struct MemoryPreferenceStore {
    inner: Mutex<Option<NavigationPreference>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn load(&self) -> DriverResult<Option<NavigationPreference>> {
        Ok(*self.inner.lock().unwrap())
    }

    async fn save(&self, preference: NavigationPreference) -> DriverResult<()> {
        *self.inner.lock().unwrap() = Some(preference);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePreferenceStore::new(dir.path().join("nav_pref.json"));

        assert_eq!(store.load().await.unwrap(), None);

        store.save(NavigationPreference::InApp).await.unwrap();
        assert_eq!(
            store.load().await.unwrap(),
            Some(NavigationPreference::InApp)
        );

        store.save(NavigationPreference::ExternalMaps).await.unwrap();
        assert_eq!(
            store.load().await.unwrap(),
            Some(NavigationPreference::ExternalMaps)
        );
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryPreferenceStore::new();
        assert_eq!(store.load().await.unwrap(), None);
        store.save(NavigationPreference::InApp).await.unwrap();
        assert_eq!(
            store.load().await.unwrap(),
            Some(NavigationPreference::InApp)
        );
    }
}
