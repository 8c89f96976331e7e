//! Document stores reached over the CouchDB HTTP API

mod client;
mod error;

pub use client::{CouchClient, CouchDatabase};
pub use error::CouchError;
