//! The REST facade: configuration, middleware, handlers and server lifecycle.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod module;
pub mod shutdown;

pub use config::NetworkConfig;
pub use handlers::{AppState, RegisteredService, ServiceDirectory};
pub use module::NetworkModule;
pub use shutdown::{HealthState, InvocationGuard, ShutdownController};
