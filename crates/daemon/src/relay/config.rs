use std::net::SocketAddr;

use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    // Listen address
    pub listen_addr: SocketAddr,
    // Hub that gets every request outside of /hub/{host}/{port}/
    pub hub_url: Url,
    // Served from /relayutility/localhttpkey
    pub http_key: Option<String>,
    // log level for http tracing
    pub log_level: tracing::Level,
}

impl Config {
    pub fn new(listen_addr: SocketAddr, hub_url: Url) -> Self {
        tracing::info!(
            "Creating relay Config: listen_addr={}, hub_url={}",
            listen_addr,
            hub_url
        );
        Self {
            listen_addr,
            hub_url,
            http_key: None,
            log_level: tracing::Level::INFO,
        }
    }

    pub fn with_http_key(mut self, http_key: Option<String>) -> Self {
        self.http_key = http_key;
        self
    }
}
