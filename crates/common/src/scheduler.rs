use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

/// Fixed, one-shot delays
#[async_trait]
pub trait Scheduler: Send + Sync + Debug {
    async fn after(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

#[async_trait]
impl Scheduler for TokioScheduler {
    async fn after(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
