use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use url::Url;

use common::bridge::{BridgeError, ReportChannel, LOG_CHANNEL};

/// Reports to the console through `tracing`
#[derive(Debug, Clone, Default)]
pub struct ConsoleChannel;

#[async_trait]
impl ReportChannel for ConsoleChannel {
    async fn report(&self, channel: &str, payload: &str) -> Result<(), BridgeError> {
        if channel == LOG_CHANNEL {
            tracing::info!(target: "relaycheck::host", "{}", payload);
        } else {
            tracing::info!(target: "relaycheck::host", channel, verdict = payload, "verdict");
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    channel: &'a str,
    payload: &'a str,
}

/// Posts every report as JSON to a host endpoint
#[derive(Debug, Clone)]
pub struct HttpReportChannel {
    url: Url,
    client: Client,
}

impl HttpReportChannel {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            client: Client::new(),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl ReportChannel for HttpReportChannel {
    async fn report(&self, channel: &str, payload: &str) -> Result<(), BridgeError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&Report { channel, payload })
            .send()
            .await
            .map_err(|e| BridgeError::new(channel, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::new(
                channel,
                format!("host answered {}", status),
            ));
        }
        Ok(())
    }
}
