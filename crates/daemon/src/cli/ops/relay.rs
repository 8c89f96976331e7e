use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Args;
use url::Url;

use relaycheck_daemon::state::{AppState, StateError};
use relaycheck_daemon::{spawn_relay, RelayConfig};

#[derive(Args, Debug, Clone)]
pub struct Relay {
    /// Override the listen port (default from config)
    #[arg(long)]
    pub port: Option<u16>,

    /// Override the default hub (default from config)
    #[arg(long)]
    pub hub_url: Option<Url>,

    /// Directory for log files (logs to stdout only if not set)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("state error: {0}")]
    StateError(#[from] StateError),

    #[error("relay failed: {0}")]
    Failed(#[from] std::io::Error),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Relay {
    type Error = RelayError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = AppState::load_or_default(ctx.config_path.clone())?;
        let relay = state.config.relay;

        let port = self.port.unwrap_or(relay.listen_port);
        let hub_url = self.hub_url.clone().unwrap_or(relay.hub_url);

        let config = RelayConfig::new(SocketAddr::from(([127, 0, 0, 1], port)), hub_url)
            .with_http_key(relay.http_key);

        spawn_relay(config, self.log_dir.as_deref()).await?;
        Ok("relay stopped".to_string())
    }
}
