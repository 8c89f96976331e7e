use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::ids::IdGenerator;
use crate::provision::{EndpointProvisioner, LoopbackProvisioner, ProvisionError};
use crate::scheduler::Scheduler;

/// Hands out `<prefix>-0`, `<prefix>-1`, ...
#[derive(Debug, Clone)]
pub struct FixedIdGenerator {
    prefix: String,
    next: Arc<AtomicUsize>,
}

impl FixedIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl IdGenerator for FixedIdGenerator {
    fn new_unique_id(&self) -> String {
        format!("{}-{}", self.prefix, self.next.fetch_add(1, Ordering::SeqCst))
    }
}

/// Records requested delays and returns immediately
#[derive(Debug, Clone, Default)]
pub struct RecordingScheduler {
    waits: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().clone()
    }
}

#[async_trait]
impl Scheduler for RecordingScheduler {
    async fn after(&self, duration: Duration) {
        self.waits.lock().push(duration);
    }
}

/// Loopback provisioner that can be told to fail a given call
#[derive(Debug, Clone, Default)]
pub struct FailingProvisioner {
    fail_client_to_hub: bool,
    fail_hub_to_hub: bool,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FailingProvisioner {
    pub fn client_to_hub() -> Self {
        Self {
            fail_client_to_hub: true,
            ..Self::default()
        }
    }

    pub fn hub_to_hub() -> Self {
        Self {
            fail_hub_to_hub: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl EndpointProvisioner for FailingProvisioner {
    async fn client_to_hub(&self, host: &str, port: u16) -> Result<String, ProvisionError> {
        self.calls.lock().push(format!("client_to_hub {}:{}", host, port));
        if self.fail_client_to_hub {
            return Err(ProvisionError::Unavailable {
                host: host.to_string(),
                port,
                reason: "injected failure".to_string(),
            });
        }
        LoopbackProvisioner.client_to_hub(host, port).await
    }

    async fn hub_to_hub(
        &self,
        base: &str,
        host: &str,
        port: u16,
    ) -> Result<String, ProvisionError> {
        self.calls.lock().push(format!("hub_to_hub {}:{}", host, port));
        if self.fail_hub_to_hub {
            return Err(ProvisionError::Unavailable {
                host: host.to_string(),
                port,
                reason: "injected failure".to_string(),
            });
        }
        LoopbackProvisioner.hub_to_hub(base, host, port).await
    }
}
