use clap::Args;
use url::Url;

use relaycheck_daemon::relay::HUB_PREFIX;
use relaycheck_daemon::state::AppState;

#[derive(Args, Debug, Clone)]
pub struct Health {
    /// Relay to probe (default from config)
    #[arg(long)]
    pub relay_url: Option<Url>,
}

#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error("Health check failed: {0}")]
    Failed(String),
}

async fn probe(client: &reqwest::Client, url: &str) -> String {
    match client.get(url).send().await {
        Ok(resp) if resp.status().is_success() => "OK".to_string(),
        Ok(resp) => format!("UNHEALTHY ({})", resp.status()),
        Err(_) => "NOT REACHABLE".to_string(),
    }
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Health {
    type Error = HealthError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut lines = Vec::new();

        // 1. Check config directory
        lines.push("Config:".to_string());
        let state = match AppState::load(ctx.config_path.clone()) {
            Ok(state) => {
                lines.push(format!("  directory:    {}", state.config_dir.display()));
                lines.push("  config.toml:  OK".to_string());
                state
            }
            Err(e) => {
                lines.push(format!("  error: {}", e));
                AppState::load_or_default(ctx.config_path.clone())
                    .map_err(|e| HealthError::Failed(e.to_string()))?
            }
        };

        // 2. Check relay liveness
        let relay = self
            .relay_url
            .clone()
            .unwrap_or_else(|| state.config.relay_url.clone());
        let base = relay.as_str().trim_end_matches('/');

        lines.push(String::new());
        lines.push(format!("Relay ({}):", relay));
        let livez = probe(&ctx.http, &format!("{}/_status/livez", base)).await;
        lines.push(format!("  livez:  {}", livez));

        // 3. Check both hubs through the relay
        let host = &state.config.host;
        for (label, port) in [
            ("hub", state.config.port),
            ("second hub", state.config.second_port),
        ] {
            let url = format!("{}{}{}/{}/", base, HUB_PREFIX, host, port);
            let status = probe(&ctx.http, &url).await;
            lines.push(format!("  {} {}:{}:  {}", label, host, port, status));
        }

        Ok(lines.join("\n"))
    }
}
