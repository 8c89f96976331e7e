//! Report channel to the hosting process
//!
//! The check reports two kinds of events to its host: routine log lines on
//! the `log` channel and the final verdict on the `Test` channel.

use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

pub const LOG_CHANNEL: &str = "log";
pub const VERDICT_CHANNEL: &str = "Test";

/// The single pass/fail signal of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Good,
    Bad,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Good => "Good",
            Verdict::Bad => "Bad",
        }
    }

    pub fn parse(payload: &str) -> Option<Self> {
        match payload {
            "Good" => Some(Verdict::Good),
            "Bad" => Some(Verdict::Bad),
            _ => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The report channel itself failed. This is an infrastructure fault,
///  never a check failure.
#[derive(Debug, thiserror::Error)]
#[error("report channel failed on '{channel}': {reason}")]
pub struct BridgeError {
    pub channel: String,
    pub reason: String,
}

impl BridgeError {
    pub fn new(channel: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            channel: channel.into(),
            reason: reason.to_string(),
        }
    }
}

/// One-shot event emission to the host
#[async_trait]
pub trait ReportChannel: Send + Sync + Debug {
    async fn report(&self, channel: &str, payload: &str) -> Result<(), BridgeError>;
}

#[async_trait]
impl<'a, T: ReportChannel + ?Sized> ReportChannel for &'a T {
    async fn report(&self, channel: &str, payload: &str) -> Result<(), BridgeError> {
        (**self).report(channel, payload).await
    }
}

#[async_trait]
impl<T: ReportChannel + ?Sized> ReportChannel for Arc<T> {
    async fn report(&self, channel: &str, payload: &str) -> Result<(), BridgeError> {
        (**self).report(channel, payload).await
    }
}

/// What happened to a verdict handed to [`Reporter::verdict`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictDelivery {
    Sent,
    /// An earlier verdict already went out; this one was only logged
    Suppressed,
}

/// Fronts a [`ReportChannel`]: mirrors log lines into tracing and makes the
///  verdict a one-shot, first-wins action
#[derive(Debug)]
pub struct Reporter<R> {
    channel: R,
    verdict_sent: AtomicBool,
}

impl<R: ReportChannel> Reporter<R> {
    pub fn new(channel: R) -> Self {
        Self {
            channel,
            verdict_sent: AtomicBool::new(false),
        }
    }

    pub fn channel(&self) -> &R {
        &self.channel
    }

    /// Log both locally and to the host
    pub async fn log(&self, message: &str) -> Result<(), BridgeError> {
        tracing::info!("{}", message);
        self.channel.report(LOG_CHANNEL, message).await
    }

    pub fn verdict_sent(&self) -> bool {
        self.verdict_sent.load(Ordering::SeqCst)
    }

    /// Report the run's verdict; only the first call reaches the host
    pub async fn verdict(&self, verdict: Verdict) -> Result<VerdictDelivery, BridgeError> {
        if self
            .verdict_sent
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!(%verdict, "verdict already reported, suppressing");
            return Ok(VerdictDelivery::Suppressed);
        }

        tracing::info!(%verdict, "reporting verdict");
        self.channel.report(VERDICT_CHANNEL, verdict.as_str()).await?;
        Ok(VerdictDelivery::Sent)
    }
}
