use clap::Args;
use url::Url;

use relaycheck_daemon::state::{AppConfig, AppState, RelayConfig, StateError};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Host the hubs listen on (default: 127.0.0.1)
    #[arg(long)]
    pub host: Option<String>,

    /// Port of the first hub (default: 9898)
    #[arg(long)]
    pub port: Option<u16>,

    /// Port of the second hub (default: 9899)
    #[arg(long)]
    pub second_port: Option<u16>,

    /// Relay the check provisions its hub locators through
    #[arg(long)]
    pub relay_url: Option<Url>,

    /// Default hub for the relay server
    #[arg(long)]
    pub hub_url: Option<Url>,

    /// Key the relay hands to local clients
    #[arg(long)]
    pub http_key: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] StateError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let defaults = AppConfig::default();
        let config = AppConfig {
            host: self.host.clone().unwrap_or(defaults.host),
            port: self.port.unwrap_or(defaults.port),
            second_port: self.second_port.unwrap_or(defaults.second_port),
            relay_url: self.relay_url.clone().unwrap_or(defaults.relay_url),
            relay: RelayConfig {
                hub_url: self.hub_url.clone().unwrap_or(defaults.relay.hub_url),
                http_key: self.http_key.clone(),
                ..defaults.relay
            },
            ..defaults
        };

        let state = AppState::init(ctx.config_path.clone(), Some(config))?;

        let output = format!(
            "Initialized relaycheck directory at: {}\n\
             - Config: {}\n\
             - Hubs: {}:{} and {}:{}\n\
             - Relay URL: {}\n\
             - Relay listen port: {}\n\
             - Relay default hub: {}",
            state.config_dir.display(),
            state.config_path.display(),
            state.config.host,
            state.config.port,
            state.config.host,
            state.config.second_port,
            state.config.relay_url,
            state.config.relay.listen_port,
            state.config.relay.hub_url,
        );

        Ok(output)
    }
}
