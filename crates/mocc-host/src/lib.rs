//! Wiring for the MOCC backend: settings, the shared application context,
//! the event flows and the HTTP and timer triggers that invoke them.

mod error;

pub use error::HostError;

pub mod config;
pub mod context;
pub mod events;
pub mod flows;
pub mod scheduler;
pub mod server;

pub use config::Settings;
pub use context::AppContext;
