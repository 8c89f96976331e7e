/**
 * Report channel to the hosting process.
 *  - `log` lines and the one-shot `Good` / `Bad` verdict
 */
pub mod bridge;
/**
 * JSON documents, revisions and `all_docs` rows.
 */
pub mod document;
/**
 * The replication check itself: the step sequence,
 *  its continuation wrappers and the per-run context.
 */
pub mod driver;
pub mod ids;
/**
 * Hands out the hub locators a pass talks to.
 */
pub mod provision;
pub mod scheduler;
/**
 * Document store traits, replication and the
 *  embedded in-memory store.
 */
pub mod store;
/**
 * Recording and fault-injecting collaborators
 *  for driving the check in tests.
 */
pub mod testkit;
/**
 * Helper for setting build version information
 *  at compile time.
 */
pub mod version;

pub mod prelude {
    pub use crate::bridge::{BridgeError, ReportChannel, Verdict};
    pub use crate::document::{AllDocsOptions, DocRow, Document};
    pub use crate::driver::{Driver, DriverBuilder, DriverConfig, Mode, RunReport, Step};
    pub use crate::provision::EndpointProvisioner;
    pub use crate::store::{Database, DocumentStore, StoreClient, StoreError};
    pub use crate::version::build_info;
}
