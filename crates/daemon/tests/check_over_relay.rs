//! A full check run through the relay against two CouchDB-compatible hubs
mod common;

use std::time::Duration;

use ::common::bridge::Verdict;
use ::common::driver::{DriverBuilder, DriverConfig, Mode, DEFAULT_BULK_COUNT};
use ::common::testkit::{RecordingChannel, RecordingScheduler};
use relaycheck_daemon::{RelayProvisioner, RoutedStoreClient};

use crate::common::{spawn_relay, unused_port, FakeCouch};

#[tokio::test]
async fn test_direct_then_bridged_over_relay() {
    let first = FakeCouch::new();
    let second = FakeCouch::new();
    let first_addr = first.spawn().await;
    let second_addr = second.spawn().await;
    let relay = spawn_relay(first_addr, None).await;

    let store = RoutedStoreClient::new().unwrap();
    let channel = RecordingChannel::new();
    let driver = DriverBuilder::new(store.clone(), channel.clone())
        .config(DriverConfig {
            host: "127.0.0.1".to_string(),
            port: first_addr.port(),
            second_port: second_addr.port(),
            settle: Duration::from_millis(10),
            ..DriverConfig::default()
        })
        .provisioner(RelayProvisioner::new(relay.url()))
        .scheduler(RecordingScheduler::new())
        .build();

    let report = driver.run().await.unwrap();

    assert!(report.is_good(), "run failed: {:?}", report.failure);
    assert_eq!(channel.verdicts(), vec![Verdict::Good]);
    assert_eq!(report.passes[0].mode, Mode::Direct);
    assert_eq!(report.passes[1].mode, Mode::Bridged);

    let expected = DEFAULT_BULK_COUNT + 2;

    // Direct pass: scratch databases stay embedded, the test database lives on the first hub
    assert_eq!(store.embedded().doc_count("local"), expected);
    assert_eq!(store.embedded().doc_count("localcopy"), expected);

    // Bridged pass: scratch databases on the first hub, test database on the second
    assert_eq!(first.store.doc_count("local"), expected);
    assert_eq!(first.store.doc_count("localcopy"), expected);
    assert_eq!(second.store.doc_count("test"), expected);

    // Both bridged replications ran on the hub in front of their source
    assert_eq!(first.replications().len(), 1);
    assert_eq!(second.replications().len(), 1);
    assert_eq!(report.passes[1].docs_verified, expected);

    // Both targets were destroyed at pass start, so each pull asks the hub to recreate them
    for body in first.replications().iter().chain(second.replications().iter()) {
        assert_eq!(body["create_target"], serde_json::json!(true), "{}", body);
    }
    assert!(second.replications()[0]["target"]
        .as_str()
        .unwrap()
        .ends_with("/localcopy"));
}

#[tokio::test]
async fn test_unreachable_second_hub_fails_the_bridged_pass() {
    let first = FakeCouch::new();
    let first_addr = first.spawn().await;
    let relay = spawn_relay(first_addr, None).await;

    let channel = RecordingChannel::new();
    let driver = DriverBuilder::new(RoutedStoreClient::new().unwrap(), channel.clone())
        .config(DriverConfig {
            port: first_addr.port(),
            second_port: unused_port().await,
            ..DriverConfig::default()
        })
        .provisioner(RelayProvisioner::new(relay.url()))
        .scheduler(RecordingScheduler::new())
        .build();

    let report = driver.run().await.unwrap();

    assert_eq!(report.verdict, Verdict::Bad);
    assert_eq!(channel.verdicts(), vec![Verdict::Bad]);
    let failure = report.failure.unwrap();
    assert_eq!(failure.step, ::common::driver::Step::ProvisionSecondary);
    assert_eq!(failure.mode, Mode::Bridged);
}
