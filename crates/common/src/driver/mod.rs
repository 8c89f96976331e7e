//! The replication check driver
//!
//! A run executes the scripted sequence once per mode. Starting in direct
//! mode, a successful pass flips the run to bridged mode and starts over;
//! a successful bridged pass reports the `Good` verdict. The first failing
//! step reports `Bad` and ends the run.
//!
//! # Example
//!
//! ```rust,ignore
//! use common::driver::DriverBuilder;
//! use common::store::MemoryStoreClient;
//! use common::testkit::RecordingChannel;
//!
//! let driver = DriverBuilder::new(MemoryStoreClient::new(), RecordingChannel::new()).build();
//! let report = driver.run().await?;
//! assert_eq!(report.verdict, common::bridge::Verdict::Good);
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::bridge::{BridgeError, ReportChannel, Reporter, Verdict};
use crate::ids::{IdGenerator, UuidGenerator};
use crate::provision::{EndpointProvisioner, LoopbackProvisioner};
use crate::scheduler::{Scheduler, TokioScheduler};
use crate::store::StoreClient;

mod chain;
mod context;
mod sequence;

pub use chain::{Chain, Halt};
pub use context::{RunContext, LOCAL_COPY_DB, LOCAL_DB, REMOTE_TEST_DB};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9898;
pub const DEFAULT_SECOND_PORT: u16 = 9899;
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(1);
pub const DEFAULT_BULK_COUNT: usize = 10;

/// Which transport a pass uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Direct,
    Bridged,
}

impl Mode {
    pub fn is_bridged(&self) -> bool {
        matches!(self, Mode::Bridged)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Direct => f.write_str("direct"),
            Mode::Bridged => f.write_str("bridged"),
        }
    }
}

/// The named steps of one pass, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    ProvisionPrimary,
    /// Bridged mode only
    ProvisionSecondary,
    DestroyRemoteTestDb,
    DestroyLocalScratchDb,
    DestroyLocalCopyDb,
    CreateLocalAndSeedDoc1,
    SeedDoc2,
    BulkInsertGenerated,
    ReplicateLocalToRemote,
    ReplicateRemoteToLocalCopy,
    EnumerateLocalDocs,
    VerifyEach,
    Success,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::ProvisionPrimary => "provision_primary",
            Step::ProvisionSecondary => "provision_secondary",
            Step::DestroyRemoteTestDb => "destroy_remote_test_db",
            Step::DestroyLocalScratchDb => "destroy_local_scratch_db",
            Step::DestroyLocalCopyDb => "destroy_local_copy_db",
            Step::CreateLocalAndSeedDoc1 => "create_local_and_seed_doc1",
            Step::SeedDoc2 => "seed_doc2",
            Step::BulkInsertGenerated => "bulk_insert_generated",
            Step::ReplicateLocalToRemote => "replicate_local_to_remote",
            Step::ReplicateRemoteToLocalCopy => "replicate_remote_to_local_copy",
            Step::EnumerateLocalDocs => "enumerate_local_docs",
            Step::VerifyEach => "verify_each",
            Step::Success => "success",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub host: String,
    /// Port of the first hub
    pub port: u16,
    /// Port of the second hub, used by bridged passes
    pub second_port: u16,
    /// Fixed wait before inbound replication and before enumeration
    pub settle: Duration,
    /// How many generated documents the bulk insert writes
    pub bulk_count: usize,
    pub start_mode: Mode,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            second_port: DEFAULT_SECOND_PORT,
            settle: DEFAULT_SETTLE,
            bulk_count: DEFAULT_BULK_COUNT,
            start_mode: Mode::Direct,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    pub step: Step,
    pub mode: Mode,
    pub error: String,
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed in {} mode: {}", self.step, self.mode, self.error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassSummary {
    pub pass: usize,
    pub mode: Mode,
    pub local_base: String,
    pub remote_test_db: String,
    pub tag: Option<String>,
    pub docs_enumerated: usize,
    pub docs_verified: usize,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub verdict: Verdict,
    pub passes: Vec<PassSummary>,
    pub failure: Option<StepFailure>,
}

impl RunReport {
    pub fn is_good(&self) -> bool {
        self.verdict == Verdict::Good
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The host can no longer be told anything about this run
    #[error(transparent)]
    ReportChannel(#[from] BridgeError),
}

pub struct Driver<C, R> {
    config: DriverConfig,
    store: C,
    channel: R,
    provisioner: Arc<dyn EndpointProvisioner>,
    ids: Arc<dyn IdGenerator>,
    scheduler: Arc<dyn Scheduler>,
}

impl<C, R> Driver<C, R>
where
    C: StoreClient,
    R: ReportChannel,
{
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn store(&self) -> &C {
        &self.store
    }

    pub fn channel(&self) -> &R {
        &self.channel
    }

    /// Run the check to its verdict
    ///
    /// # Returns
    /// * `Ok(RunReport)` - the verdict was delivered, `Good` or `Bad`
    /// * `Err(DriverError)` - the report channel failed and the host
    ///   may not have heard the outcome
    pub async fn run(&self) -> Result<RunReport, DriverError> {
        let reporter = Reporter::new(&self.channel);
        let mut ctx = RunContext::<C>::new(self.config.start_mode);
        let mut passes = Vec::new();

        loop {
            ctx.begin_pass();
            tracing::info!(pass = ctx.pass, mode = %ctx.mode, "starting check pass");

            let chain = Chain::new(&reporter, ctx.mode);
            match self.pass(&chain, &mut ctx).await {
                Ok(()) => {
                    passes.push(ctx.summary(true));
                    reporter
                        .log(&format!(
                            "Check successfully completed! bridged = {}",
                            ctx.mode.is_bridged()
                        ))
                        .await?;

                    if ctx.mode == Mode::Direct {
                        ctx.mode = Mode::Bridged;
                        continue;
                    }

                    reporter.verdict(Verdict::Good).await?;
                    return Ok(RunReport {
                        verdict: Verdict::Good,
                        passes,
                        failure: None,
                    });
                }
                Err(Halt::Failed(failure)) => {
                    passes.push(ctx.summary(false));
                    return Ok(RunReport {
                        verdict: Verdict::Bad,
                        passes,
                        failure: Some(failure),
                    });
                }
                Err(Halt::Fatal(err)) => return Err(err.into()),
            }
        }
    }
}

/// Assembles a [`Driver`] from its collaborators
///
/// Only the store client and report channel are required; everything else
///  defaults to the loopback provisioner, random uuids and tokio timers.
pub struct DriverBuilder<C, R> {
    store: C,
    channel: R,
    config: DriverConfig,
    provisioner: Option<Arc<dyn EndpointProvisioner>>,
    ids: Option<Arc<dyn IdGenerator>>,
    scheduler: Option<Arc<dyn Scheduler>>,
}

impl<C, R> DriverBuilder<C, R>
where
    C: StoreClient,
    R: ReportChannel,
{
    pub fn new(store: C, channel: R) -> Self {
        Self {
            store,
            channel,
            config: DriverConfig::default(),
            provisioner: None,
            ids: None,
            scheduler: None,
        }
    }

    pub fn config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn provisioner(mut self, provisioner: impl EndpointProvisioner + 'static) -> Self {
        self.provisioner = Some(Arc::new(provisioner));
        self
    }

    pub fn ids(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Some(Arc::new(ids));
        self
    }

    pub fn scheduler(mut self, scheduler: impl Scheduler + 'static) -> Self {
        self.scheduler = Some(Arc::new(scheduler));
        self
    }

    pub fn build(self) -> Driver<C, R> {
        Driver {
            config: self.config,
            store: self.store,
            channel: self.channel,
            provisioner: self
                .provisioner
                .unwrap_or_else(|| Arc::new(LoopbackProvisioner)),
            ids: self.ids.unwrap_or_else(|| Arc::new(UuidGenerator)),
            scheduler: self.scheduler.unwrap_or_else(|| Arc::new(TokioScheduler)),
        }
    }
}
