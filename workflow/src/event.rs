//! Ordered event channel between running nodes and the stream consumer.

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::Stream;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

pub const DEFAULT_EVENT_CAPACITY: usize = 128;

/// A typed item of run output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Event {
    /// Reasoning or progress text.
    Thought(String),
    /// User-facing answer text.
    Message(String),
    /// Machine-readable result extracted from an answer.
    StructuredPayload(Value),
    /// Terminal failure of the run; nothing follows it.
    Error(String),
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Thought(_) => "thought",
            Event::Message(_) => "message",
            Event::StructuredPayload(_) => "structured_payload",
            Event::Error(_) => "error",
        }
    }
}

/// Producer half. Cheap to clone; the stream ends once every clone is dropped.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<Event>,
}

impl EventSink {
    /// Publish an event, waiting for capacity. Returns `false` once the
    /// consumer has gone away.
    pub async fn publish(&self, event: Event) -> bool {
        self.tx.send(event).await.is_ok()
    }

    pub async fn thought(&self, text: impl Into<String>) -> bool {
        self.publish(Event::Thought(text.into())).await
    }

    pub async fn message(&self, text: impl Into<String>) -> bool {
        self.publish(Event::Message(text.into())).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves when the consumer drops its [`EventStream`].
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Consumer half of a run's events.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<Event>,
}

impl EventStream {
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Drain the stream to completion.
    pub async fn collect_all(mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            events.push(event);
        }
        events
    }
}

impl Stream for EventStream {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Create a bounded sink/stream pair.
pub fn event_channel(capacity: usize) -> (EventSink, EventStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSink { tx }, EventStream { rx })
}
