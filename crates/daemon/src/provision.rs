use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use common::provision::{EndpointProvisioner, ProvisionError};

const HUB_SEGMENT: &str = "hub/";

/// Provisions hub locators on a relay
///
/// `client_to_hub(host, port)` is `<relay>/hub/{host}/{port}/`. A hub-to-hub
///  path is provisioned on the relay the `base` locator already goes through.
///  Every locator is probed once before it is handed out.
#[derive(Debug, Clone)]
pub struct RelayProvisioner {
    relay: Url,
    client: Client,
}

impl RelayProvisioner {
    pub fn new(relay: Url) -> Self {
        Self::with_client(relay, Client::new())
    }

    pub fn with_client(mut relay: Url, client: Client) -> Self {
        if !relay.path().ends_with('/') {
            let path = format!("{}/", relay.path());
            relay.set_path(&path);
        }
        Self { relay, client }
    }

    pub fn relay(&self) -> &Url {
        &self.relay
    }

    fn hub_locator(relay: &str, host: &str, port: u16) -> String {
        format!("{}{}{}/{}/", relay, HUB_SEGMENT, host, port)
    }

    async fn probe(&self, locator: String, host: &str, port: u16) -> Result<String, ProvisionError> {
        let unavailable = |reason: String| ProvisionError::Unavailable {
            host: host.to_string(),
            port,
            reason,
        };

        let response = self
            .client
            .get(&locator)
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(unavailable(format!("relay answered {}", response.status())));
        }

        tracing::debug!(%locator, "provisioned hub locator");
        Ok(locator)
    }
}

#[async_trait]
impl EndpointProvisioner for RelayProvisioner {
    async fn client_to_hub(&self, host: &str, port: u16) -> Result<String, ProvisionError> {
        let locator = Self::hub_locator(self.relay.as_str(), host, port);
        self.probe(locator, host, port).await
    }

    async fn hub_to_hub(
        &self,
        base: &str,
        host: &str,
        port: u16,
    ) -> Result<String, ProvisionError> {
        let relay = base
            .find(&format!("/{}", HUB_SEGMENT))
            .map(|idx| &base[..=idx])
            .ok_or_else(|| ProvisionError::InvalidBase(base.to_string()))?;

        let locator = Self::hub_locator(relay, host, port);
        self.probe(locator, host, port).await
    }
}
