use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

use crate::ast::Span;
use crate::checkpoint::CheckpointRecord;
use crate::eval::{ErrorKind, InterpreterState};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ExecutionStarted {
        execution_id: String,
        origin: String,
    },
    ExecutionFinished {
        execution_id: String,
        state: InterpreterState,
    },
    Checkpoint(CheckpointRecord),
    LibraryLoaded {
        identifier: String,
        name: String,
        version: String,
    },
    TargetRegistered {
        name: String,
        library: Option<String>,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::ExecutionStarted { .. } => "ExecutionStarted",
            Event::ExecutionFinished { .. } => "ExecutionFinished",
            Event::Checkpoint(_) => "Checkpoint",
            Event::LibraryLoaded { .. } => "LibraryLoaded",
            Event::TargetRegistered { .. } => "TargetRegistered",
        }
    }
}

/// A script that ended in an unhandled error.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorEvent {
    pub execution_id: String,
    pub kind: ErrorKind,
    pub message: String,
    pub location: Option<Span>,
}

/// Broadcast hub shared by everything in one session.
///
/// Publishing never waits: when the buffer is full the slowest subscriber lags and sees
/// [`EventError::Lagged`] on its next receive.
pub struct EventBus {
    event_sender: broadcast::Sender<Event>,
    error_sender: broadcast::Sender<ErrorEvent>,
    capacity: usize,
    // keeps both channels open while nobody is subscribed
    _internal_receiver: broadcast::Receiver<Event>,
    _internal_error_receiver: broadcast::Receiver<ErrorEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (event_sender, event_receiver) = broadcast::channel(capacity.max(1));
        let (error_sender, error_receiver) = broadcast::channel(capacity.max(1));
        Self {
            event_sender,
            error_sender,
            capacity,
            _internal_receiver: event_receiver,
            _internal_error_receiver: error_receiver,
        }
    }

    pub fn subscribe(&self) -> (EventReceiver, ErrorReceiver) {
        let event_rx = self.event_sender.subscribe();
        let error_rx = self.error_sender.subscribe();
        (EventReceiver::new(event_rx), ErrorReceiver::new(error_rx))
    }

    pub async fn publish(&self, event: Event) -> EventResult<()> {
        self.sync_publish(event)
    }

    pub fn sync_publish(&self, event: Event) -> EventResult<()> {
        debug!("Publishing {} event", event.name());
        self.event_sender
            .send(event)
            .map_err(|e| EventError::SendFailed {
                message: e.to_string(),
            })?;
        Ok(())
    }

    pub fn sync_publish_error(&self, error: ErrorEvent) -> EventResult<()> {
        self.error_sender
            .send(error)
            .map_err(|e| EventError::SendFailed {
                message: e.to_string(),
            })?;
        Ok(())
    }

    pub fn queue_size(&self) -> usize {
        self.event_sender.len()
    }

    pub fn subscribers_size(&self) -> usize {
        self.event_sender.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

pub struct EventReceiver {
    pub receiver: broadcast::Receiver<Event>,
}

impl EventReceiver {
    pub fn new(receiver: broadcast::Receiver<Event>) -> Self {
        Self { receiver }
    }

    /// On lag the receiver skips ahead to the live position and reports how much it missed.
    pub async fn recv(&mut self) -> EventResult<Event> {
        match self.receiver.recv().await {
            Ok(event) => Ok(event),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                self.receiver = self.receiver.resubscribe();
                Err(EventError::Lagged { count: n })
            }
            Err(e) => Err(EventError::ReceiveFailed {
                message: e.to_string(),
            }),
        }
    }

    /// Non-blocking variant for draining what is already buffered.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }
}

pub struct ErrorReceiver {
    pub receiver: broadcast::Receiver<ErrorEvent>,
}

impl ErrorReceiver {
    fn new(receiver: broadcast::Receiver<ErrorEvent>) -> Self {
        Self { receiver }
    }

    pub async fn recv(&mut self) -> EventResult<ErrorEvent> {
        self.receiver
            .recv()
            .await
            .map_err(|e| EventError::ReceiveFailed {
                message: e.to_string(),
            })
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventError {
    #[error("Event Send failed: {message}")]
    SendFailed { message: String },

    #[error("Event Receive failed: {message}")]
    ReceiveFailed { message: String },

    #[error("Event lagged: {count}")]
    Lagged { count: u64 },
}

pub type EventResult<T> = Result<T, EventError>;
