// Hub-facing services
pub mod couch;
pub mod provision;
pub mod relay;
pub mod report;
pub mod routed;

// Process plumbing (logging, signals)
pub mod process;

// App state (configuration, paths)
pub mod state;

pub use couch::{CouchClient, CouchError};
pub use process::{spawn_relay, start_relay, ShutdownHandle};
pub use provision::RelayProvisioner;
pub use relay::{Config as RelayConfig, RelayError};
pub use report::{ConsoleChannel, HttpReportChannel};
pub use routed::RoutedStoreClient;
pub use state::{AppConfig, AppState, StateError};
