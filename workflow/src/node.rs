//! Node traits and the context handed to a running node.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{NodeError, NodeResult},
    event::{Event, EventSink},
    state::RunState,
};

/// Everything a node may touch while running.
#[derive(Debug, Clone)]
pub struct NodeContext {
    pub state: Arc<RunState>,
    pub sink: EventSink,
    pub cancel: CancellationToken,
}

impl NodeContext {
    pub fn new(state: Arc<RunState>, sink: EventSink, cancel: CancellationToken) -> Self {
        Self {
            state,
            sink,
            cancel,
        }
    }

    /// Publish an event; a vanished consumer cancels the run.
    pub async fn emit(&self, event: Event) -> bool {
        let delivered = self.sink.publish(event).await;
        if !delivered {
            self.cancel.cancel();
        }
        delivered
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// An independent unit of work whose text result feeds the final node.
#[async_trait]
pub trait TaskNode: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, ctx: &NodeContext) -> NodeResult<String>;

    /// Stand-in text recorded when `run` fails.
    fn failure_placeholder(&self, err: &NodeError) -> String {
        format!("{} failed: {}", self.name(), err)
    }
}

/// The final node of a graph. Streams its output through the sink.
#[async_trait]
pub trait StreamNode: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, ctx: &NodeContext) -> NodeResult<()>;

    /// Text of the error event published when `run` fails.
    fn error_message(&self, err: &NodeError) -> String {
        format!("{} failed: {}", self.name(), err)
    }
}
