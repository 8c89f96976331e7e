use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use url::Url;

use common::bridge::{ReportChannel, Verdict};
use common::driver::{DriverBuilder, DriverConfig, DriverError, Mode, RunReport};
use common::provision::{EndpointProvisioner, LoopbackProvisioner};
use common::store::{MemoryStoreClient, StoreClient};
use relaycheck_daemon::couch::CouchError;
use relaycheck_daemon::process;
use relaycheck_daemon::state::{AppState, StateError};
use relaycheck_daemon::{ConsoleChannel, HttpReportChannel, RelayProvisioner, RoutedStoreClient};

use crate::cli::op::OpStatus;

/// Exit code for a run that ended with the `Bad` verdict
const BAD_VERDICT_EXIT_CODE: i32 = 2;

#[derive(Args, Debug, Clone)]
pub struct Run {
    /// Use the embedded store and loopback locators end to end
    #[arg(long)]
    pub in_memory: bool,

    /// Skip the direct pass and only check the bridged transport
    #[arg(long)]
    pub bridged_only: bool,

    /// Override the settle wait in milliseconds (default from config)
    #[arg(long)]
    pub settle_ms: Option<u64>,

    /// Post log lines and the verdict to this host endpoint (default from config)
    #[arg(long)]
    pub report_url: Option<Url>,

    /// Directory for log files (logs to stdout only if not set)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("state error: {0}")]
    StateError(#[from] StateError),

    #[error("could not build the store client: {0}")]
    Store(#[from] CouchError),

    #[error("check aborted: {0}")]
    Driver(#[from] DriverError),
}

#[derive(Debug)]
pub struct RunOutput {
    pub report: RunReport,
}

impl fmt::Display for RunOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let modes: Vec<String> = self
            .report
            .passes
            .iter()
            .map(|pass| pass.mode.to_string())
            .collect();

        match &self.report.failure {
            None => write!(
                f,
                "{}: {} pass(es) completed ({})",
                self.report.verdict,
                self.report.passes.len(),
                modes.join(", ")
            ),
            Some(failure) => write!(f, "{}: {}", self.report.verdict, failure),
        }
    }
}

impl OpStatus for RunOutput {
    fn exit_code(&self) -> i32 {
        match self.report.verdict {
            Verdict::Good => 0,
            Verdict::Bad => BAD_VERDICT_EXIT_CODE,
        }
    }
}

async fn drive<C: StoreClient>(
    store: C,
    provisioner: impl EndpointProvisioner + 'static,
    channel: Arc<dyn ReportChannel>,
    config: DriverConfig,
) -> Result<RunReport, DriverError> {
    DriverBuilder::new(store, channel)
        .config(config)
        .provisioner(provisioner)
        .build()
        .run()
        .await
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Run {
    type Error = RunError;
    type Output = RunOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = AppState::load_or_default(ctx.config_path.clone())?;
        let _guards = process::init_logging(tracing::Level::INFO, self.log_dir.as_deref());

        let mut config = state.config.driver_config();
        if let Some(settle_ms) = self.settle_ms {
            config.settle = std::time::Duration::from_millis(settle_ms);
        }
        if self.bridged_only {
            config.start_mode = Mode::Bridged;
        }

        let channel: Arc<dyn ReportChannel> =
            match self.report_url.as_ref().or(state.config.report_url.as_ref()) {
                Some(url) => Arc::new(HttpReportChannel::new(url.clone())),
                None => Arc::new(ConsoleChannel),
            };

        tracing::info!(
            in_memory = self.in_memory,
            start_mode = %config.start_mode,
            relay = %state.config.relay_url,
            "starting replication check"
        );

        let report = if self.in_memory {
            drive(MemoryStoreClient::new(), LoopbackProvisioner, channel, config).await?
        } else {
            let provisioner = RelayProvisioner::with_client(
                state.config.relay_url.clone(),
                ctx.http.clone(),
            );
            drive(RoutedStoreClient::new()?, provisioner, channel, config).await?
        };

        Ok(RunOutput { report })
    }
}
