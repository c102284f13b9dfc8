// src/services/mod.rs
pub mod api_client;
pub mod dispatch;
pub mod navigation;
pub mod preferences;
pub mod session;

use tokio::task::JoinHandle;

/// Owns a simulator's background task. Aborting on drop guarantees no
/// tick fires after the owner tears the simulator down.
pub struct SimulatorHandle {
    task: JoinHandle<()>,
}

impl SimulatorHandle {
    pub(crate) fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    pub fn abort(&self) {
        self.task.abort();
    }
}

impl Drop for SimulatorHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
