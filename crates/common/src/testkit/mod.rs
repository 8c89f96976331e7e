/// Fakes for exercising the check driver in-process
///
/// Every collaborator the driver talks to has a stand-in here that records
/// what it was asked to do and can be told to fail.
///
/// # Example
///
/// ```rust,ignore
/// use common::driver::DriverBuilder;
/// use common::testkit::{FaultyStoreClient, RecordingChannel, RecordingScheduler, StoreOp};
///
/// #[tokio::test]
/// async fn test_destroy_failure_is_bad() -> anyhow::Result<()> {
///     let store = FaultyStoreClient::new().fail_on(StoreOp::Destroy, 1);
///     let channel = RecordingChannel::new();
///
///     let driver = DriverBuilder::new(store.clone(), channel.clone())
///         .scheduler(RecordingScheduler::new())
///         .build();
///
///     let report = driver.run().await?;
///     assert!(!report.is_good());
///     Ok(())
/// }
/// ```
mod channel;
mod fakes;
mod store;

pub use channel::{ChannelEvent, RecordingChannel};
pub use fakes::{FailingProvisioner, FixedIdGenerator, RecordingScheduler};
pub use store::{FaultyStore, FaultyStoreClient, StoreCall, StoreOp};
