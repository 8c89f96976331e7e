use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::bridge::{BridgeError, ReportChannel, Verdict, LOG_CHANNEL, VERDICT_CHANNEL};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEvent {
    pub channel: String,
    pub payload: String,
}

/// Report channel that remembers everything sent to it
#[derive(Debug, Clone, Default)]
pub struct RecordingChannel {
    events: Arc<Mutex<Vec<ChannelEvent>>>,
    /// Reports on this channel fail instead of being recorded
    failing: Option<String>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel whose reports on `channel` always fail
    pub fn failing_on(channel: &str) -> Self {
        Self {
            failing: Some(channel.to_string()),
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<ChannelEvent> {
        self.events.lock().clone()
    }

    pub fn logs(&self) -> Vec<String> {
        self.payloads_on(LOG_CHANNEL)
    }

    pub fn verdicts(&self) -> Vec<Verdict> {
        self.payloads_on(VERDICT_CHANNEL)
            .iter()
            .filter_map(|payload| Verdict::parse(payload))
            .collect()
    }

    pub fn logged(&self, line: &str) -> bool {
        self.logs().iter().any(|l| l == line)
    }

    fn payloads_on(&self, channel: &str) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.channel == channel)
            .map(|event| event.payload.clone())
            .collect()
    }
}

#[async_trait]
impl ReportChannel for RecordingChannel {
    async fn report(&self, channel: &str, payload: &str) -> Result<(), BridgeError> {
        if self.failing.as_deref() == Some(channel) {
            return Err(BridgeError::new(channel, "host rejected the report"));
        }

        self.events.lock().push(ChannelEvent {
            channel: channel.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }
}
