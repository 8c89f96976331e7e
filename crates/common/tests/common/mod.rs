//! Shared helpers for driving the check against the embedded store
#![allow(dead_code)]

use std::time::Duration;

use common::driver::{Driver, DriverBuilder, DriverConfig, Mode};
use common::testkit::{FaultyStoreClient, FixedIdGenerator, RecordingChannel, RecordingScheduler};

pub const TAG_PREFIX: &str = "run";

pub fn test_config() -> DriverConfig {
    DriverConfig {
        settle: Duration::from_millis(250),
        ..DriverConfig::default()
    }
}

/// Everything a test needs to drive one run and inspect it afterwards
pub struct Harness {
    pub driver: Driver<FaultyStoreClient, RecordingChannel>,
    pub store: FaultyStoreClient,
    pub channel: RecordingChannel,
    pub scheduler: RecordingScheduler,
}

pub fn harness(store: FaultyStoreClient) -> Harness {
    harness_with(store, RecordingChannel::new(), test_config())
}

pub fn harness_starting_in(store: FaultyStoreClient, mode: Mode) -> Harness {
    let config = DriverConfig {
        start_mode: mode,
        ..test_config()
    };
    harness_with(store, RecordingChannel::new(), config)
}

pub fn harness_with(
    store: FaultyStoreClient,
    channel: RecordingChannel,
    config: DriverConfig,
) -> Harness {
    let scheduler = RecordingScheduler::new();
    let driver = DriverBuilder::new(store.clone(), channel.clone())
        .config(config)
        .ids(FixedIdGenerator::new(TAG_PREFIX))
        .scheduler(scheduler.clone())
        .build();

    Harness {
        driver,
        store,
        channel,
        scheduler,
    }
}

/// Install a test subscriber so failing runs print their tracing output
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}
