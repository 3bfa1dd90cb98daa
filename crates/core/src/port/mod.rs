// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod process_launcher;
pub mod process_lister;
pub mod status_probe;
pub mod time_provider;

// Re-exports
pub use id_provider::IdProvider;
pub use process_launcher::{LaunchCommand, LaunchError, ProcessLauncher, ReadinessGate, RootProcess};
pub use process_lister::{ListingError, ProcessLister};
pub use status_probe::StatusProbe;
pub use time_provider::TimeProvider;
