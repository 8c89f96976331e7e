//! Continuation wrappers that glue the check's steps together
//!
//! Each step produces a `Result`. The wrappers decide what happens next:
//! on error the run is reported `Bad` and halted, on success the next step
//! is announced and the caller carries on.

use std::fmt::Display;

use crate::bridge::{BridgeError, ReportChannel, Reporter, Verdict};

use super::{Mode, Step, StepFailure};

/// Why the sequence stopped early
#[derive(Debug)]
pub enum Halt {
    /// A step failed and the `Bad` verdict has been handled
    Failed(StepFailure),
    /// The report channel broke; nothing more can be reported
    Fatal(BridgeError),
}

impl From<BridgeError> for Halt {
    fn from(err: BridgeError) -> Self {
        Halt::Fatal(err)
    }
}

pub struct Chain<'a, R> {
    reporter: &'a Reporter<R>,
    mode: Mode,
}

impl<'a, R: ReportChannel> Chain<'a, R> {
    pub fn new(reporter: &'a Reporter<R>, mode: Mode) -> Self {
        Self { reporter, mode }
    }

    pub fn reporter(&self) -> &Reporter<R> {
        self.reporter
    }

    pub async fn log(&self, message: &str) -> Result<(), Halt> {
        Ok(self.reporter.log(message).await?)
    }

    /// On error report failure and halt; on success announce `next`
    pub async fn fail_or_continue<T, E: Display>(
        &self,
        current: Step,
        result: Result<T, E>,
        next: Step,
    ) -> Result<(), Halt> {
        if let Err(err) = result {
            return Err(self.halt(current, err).await);
        }

        self.announce(next).await
    }

    pub async fn announce(&self, step: Step) -> Result<(), Halt> {
        self.log(&format!("About to start {}", step)).await
    }

    /// On error report failure and halt; on success hand the payload to
    ///  `handle`, then announce `next` if there is one
    ///
    /// `handle` runs to completion before anything else happens, and its
    ///  return value is passed back to the caller.
    pub async fn handle_then_continue<T, E, U, F>(
        &self,
        current: Step,
        result: Result<T, E>,
        handler: &str,
        handle: F,
        next: Option<Step>,
    ) -> Result<U, Halt>
    where
        E: Display,
        F: FnOnce(T) -> U,
    {
        let payload = match result {
            Ok(payload) => payload,
            Err(err) => return Err(self.halt(current, err).await),
        };

        self.log(&format!("About to start {}", handler)).await?;
        let handled = handle(payload);

        if let Some(next) = next {
            self.announce(next).await?;
        }

        Ok(handled)
    }

    async fn halt(&self, step: Step, err: impl Display) -> Halt {
        let error = err.to_string();
        tracing::error!(%step, mode = %self.mode, %error, "check step failed");

        if let Err(fatal) = self.reporter.log(&format!("oy!{}", error)).await {
            return Halt::Fatal(fatal);
        }
        if let Err(fatal) = self.reporter.verdict(Verdict::Bad).await {
            return Halt::Fatal(fatal);
        }

        Halt::Failed(StepFailure {
            step,
            mode: self.mode,
            error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::RecordingChannel;

    #[tokio::test]
    async fn test_fail_or_continue_announces_next_step() {
        let channel = RecordingChannel::new();
        let reporter = Reporter::new(channel.clone());
        let chain = Chain::new(&reporter, Mode::Direct);

        chain
            .fail_or_continue(Step::SeedDoc2, Ok::<_, String>(()), Step::BulkInsertGenerated)
            .await
            .unwrap();

        assert_eq!(
            channel.logs(),
            vec!["About to start bulk_insert_generated".to_string()]
        );
        assert!(channel.verdicts().is_empty());
    }

    #[tokio::test]
    async fn test_error_reports_bad_once_and_halts() {
        let channel = RecordingChannel::new();
        let reporter = Reporter::new(channel.clone());
        let chain = Chain::new(&reporter, Mode::Bridged);

        let halt = chain
            .fail_or_continue(Step::DestroyRemoteTestDb, Err::<(), _>("boom"), Step::SeedDoc2)
            .await
            .unwrap_err();
        match halt {
            Halt::Failed(failure) => {
                assert_eq!(failure.step, Step::DestroyRemoteTestDb);
                assert_eq!(failure.mode, Mode::Bridged);
                assert_eq!(failure.error, "boom");
            }
            Halt::Fatal(e) => panic!("unexpected fatal halt: {}", e),
        }

        // A second failure is swallowed rather than reported again
        let _ = chain
            .handle_then_continue(
                Step::VerifyEach,
                Err::<(), _>("again"),
                "ignored",
                |_| (),
                None,
            )
            .await;

        assert_eq!(channel.verdicts(), vec![Verdict::Bad]);
        assert_eq!(channel.logs(), vec!["oy!boom".to_string(), "oy!again".to_string()]);
    }

    #[tokio::test]
    async fn test_handle_runs_before_next_is_announced() {
        let channel = RecordingChannel::new();
        let reporter = Reporter::new(channel.clone());
        let chain = Chain::new(&reporter, Mode::Direct);

        let mut captured = None;
        let doubled = chain
            .handle_then_continue(
                Step::ProvisionPrimary,
                Ok::<_, String>(21),
                "capture",
                |value| {
                    captured = Some(value);
                    value * 2
                },
                Some(Step::DestroyRemoteTestDb),
            )
            .await
            .unwrap();

        assert_eq!(captured, Some(21));
        assert_eq!(doubled, 42);
        assert_eq!(
            channel.logs(),
            vec![
                "About to start capture".to_string(),
                "About to start destroy_remote_test_db".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_broken_channel_is_fatal() {
        let channel = RecordingChannel::failing_on(crate::bridge::VERDICT_CHANNEL);
        let reporter = Reporter::new(channel);
        let chain = Chain::new(&reporter, Mode::Direct);

        let halt = chain
            .fail_or_continue(Step::SeedDoc2, Err::<(), _>("boom"), Step::BulkInsertGenerated)
            .await
            .unwrap_err();
        assert!(matches!(halt, Halt::Fatal(_)));
    }
}
