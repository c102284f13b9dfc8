pub mod errors;
pub mod models;
pub mod services;
pub mod state;
pub mod utils;

// Re-export commonly used types
pub use errors::{AppError, DriverResult};
pub use services::session::{DriverSession, DriverState, SimulationConfig, StateEvent};
pub use state::{AppConfig, AppContext};
