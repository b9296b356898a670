// Infrastructure layer (shared components)
pub mod config;
pub mod error;
pub mod metrics;
pub mod postgres;
pub mod telemetry;

// Domain layer (dispatch core)
pub mod directory;
pub mod dispatch;
pub mod notification;
pub mod push;

// Re-export the entry points the dashboard backend wires up
pub use dispatch::{CancelHandle, DispatchCoordinator, DispatchReport};
pub use error::{DispatchError, Result};
