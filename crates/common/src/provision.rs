use std::fmt::Debug;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("invalid base locator: {0}")]
    InvalidBase(String),
    #[error("hub {host}:{port} unavailable: {reason}")]
    Unavailable {
        host: String,
        port: u16,
        reason: String,
    },
}

/// Hands out the locators the check talks to
///
/// Every returned locator ends in `/`, so a database name can be appended
///  directly.
#[async_trait]
pub trait EndpointProvisioner: Send + Sync + Debug {
    /// Provision a path from this process to the hub at `host:port`
    ///
    /// # Returns
    /// * `Ok(String)` - base locator for databases on that hub
    async fn client_to_hub(&self, host: &str, port: u16) -> Result<String, ProvisionError>;

    /// Provision a path from the hub behind `base` to the hub at `host:port`
    async fn hub_to_hub(&self, base: &str, host: &str, port: u16)
        -> Result<String, ProvisionError>;
}

/// Provisioner for in-process runs against the embedded store
///
/// Locators are plain names (`mem://host:port/`), so every database lands
///  in the same embedded registry.
#[derive(Debug, Clone, Default)]
pub struct LoopbackProvisioner;

#[async_trait]
impl EndpointProvisioner for LoopbackProvisioner {
    async fn client_to_hub(&self, host: &str, port: u16) -> Result<String, ProvisionError> {
        Ok(format!("mem://{}:{}/", host, port))
    }

    async fn hub_to_hub(
        &self,
        base: &str,
        host: &str,
        port: u16,
    ) -> Result<String, ProvisionError> {
        if !base.ends_with('/') {
            return Err(ProvisionError::InvalidBase(base.to_string()));
        }
        Ok(format!("{}hub/{}/{}/", base, host, port))
    }
}
