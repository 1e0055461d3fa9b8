//! CHECKPOINT records and the sinks they are handed to.
//!
//! The interpreter builds one [`CheckpointRecord`] per `CHECKPOINT(key, value[, progress])`
//! and passes it to the session's [`CheckpointSink`]. Handoff never blocks the script;
//! delivery and any waiting on a terminal checkpoint belong to the receiving side.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::event::event_bus::{Event, EventBus};
use crate::timestamp::Timestamp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointRecord {
    pub execution_id: String,
    /// Starts at 1 and increases by one per CHECKPOINT within an execution.
    pub sequence: u64,
    pub key: String,
    pub value: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    pub timestamp: Timestamp,
}

impl CheckpointRecord {
    pub fn new(
        execution_id: impl Into<String>,
        sequence: u64,
        key: impl Into<String>,
        value: serde_json::Value,
        progress: Option<f64>,
    ) -> Result<Self, CheckpointError> {
        if let Some(progress) = progress {
            if !(0.0..=100.0).contains(&progress) {
                return Err(CheckpointError::InvalidProgress(progress));
            }
        }
        Ok(Self {
            execution_id: execution_id.into(),
            sequence,
            key: key.into(),
            value,
            progress,
            timestamp: Timestamp::now(),
        })
    }

    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CheckpointError {
    #[error("progress must be between 0 and 100, got {0}")]
    InvalidProgress(f64),
    #[error("checkpoint sink closed: {0}")]
    SinkClosed(String),
}

pub trait CheckpointSink: Send + Sync {
    /// Hands the record off without waiting for it to be consumed.
    fn publish(&self, record: CheckpointRecord) -> Result<(), CheckpointError>;
}

/// Publishes records as [`Event::Checkpoint`] on the session bus. The default sink.
pub struct EventBusSink {
    bus: Arc<EventBus>,
}

impl EventBusSink {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }
}

impl CheckpointSink for EventBusSink {
    fn publish(&self, record: CheckpointRecord) -> Result<(), CheckpointError> {
        self.bus
            .sync_publish(Event::Checkpoint(record))
            .map_err(|e| CheckpointError::SinkClosed(e.to_string()))
    }
}

/// Unbounded channel sink for an orchestrator that consumes records in order.
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<CheckpointRecord>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CheckpointRecord>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl CheckpointSink for ChannelSink {
    fn publish(&self, record: CheckpointRecord) -> Result<(), CheckpointError> {
        self.sender
            .send(record)
            .map_err(|e| CheckpointError::SinkClosed(e.to_string()))
    }
}
