//! Mock nodes for task graph tests.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use wfaas::{Event, NodeContext, NodeError, NodeResult, StreamNode, TaskNode};

/// Leaf that sleeps, then returns fixed text or a model-call error.
pub struct DelayLeaf {
    pub name: String,
    pub delay: Duration,
    pub outcome: Result<String, String>,
    pub runs: Arc<AtomicUsize>,
}

impl DelayLeaf {
    #[allow(dead_code)]
    pub fn ok(name: &str, delay_ms: u64, text: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            delay: Duration::from_millis(delay_ms),
            outcome: Ok(text.to_string()),
            runs: Arc::new(AtomicUsize::new(0)),
        })
    }

    #[allow(dead_code)]
    pub fn failing(name: &str, delay_ms: u64, error: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            delay: Duration::from_millis(delay_ms),
            outcome: Err(error.to_string()),
            runs: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl TaskNode for DelayLeaf {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &NodeContext) -> NodeResult<String> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        ctx.emit(Event::Thought(format!("{} started", self.name)))
            .await;
        tokio::time::sleep(self.delay).await;
        match &self.outcome {
            Ok(text) => Ok(text.clone()),
            Err(msg) => Err(NodeError::model_call(msg.clone())),
        }
    }
}

pub struct PanicLeaf;

#[async_trait]
impl TaskNode for PanicLeaf {
    fn name(&self) -> &str {
        "panicky"
    }

    async fn run(&self, _ctx: &NodeContext) -> NodeResult<String> {
        panic!("leaf exploded");
    }
}

/// Final node that panics after publishing one Thought.
pub struct PanicRoot;

#[async_trait]
impl StreamNode for PanicRoot {
    fn name(&self) -> &str {
        "exploding_root"
    }

    async fn run(&self, ctx: &NodeContext) -> NodeResult<()> {
        ctx.emit(Event::Thought("working".into())).await;
        panic!("root exploded");
    }
}

/// Leaf that only finishes when the run is cancelled.
pub struct StuckLeaf;

#[async_trait]
impl TaskNode for StuckLeaf {
    fn name(&self) -> &str {
        "stuck"
    }

    async fn run(&self, ctx: &NodeContext) -> NodeResult<String> {
        ctx.cancel.cancelled().await;
        Err(NodeError::Cancelled)
    }
}

/// Final node that snapshots the leaf results it sees and echoes them.
#[derive(Default)]
pub struct RecordingAggregator {
    pub runs: AtomicUsize,
    pub seen: Mutex<Vec<(String, Option<String>)>>,
    pub fail_with: Option<String>,
}

impl RecordingAggregator {
    #[allow(dead_code)]
    pub fn failing(msg: &str) -> Arc<Self> {
        Arc::new(Self {
            fail_with: Some(msg.to_string()),
            ..Default::default()
        })
    }
}

#[async_trait]
impl StreamNode for RecordingAggregator {
    fn name(&self) -> &str {
        "aggregator"
    }

    async fn run(&self, ctx: &NodeContext) -> NodeResult<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let results = ctx.state.results();
        *self.seen.lock() = results.clone();

        if let Some(msg) = &self.fail_with {
            return Err(NodeError::model_call(msg.clone()));
        }

        let summary = results
            .iter()
            .map(|(name, text)| format!("{}={}", name, text.as_deref().unwrap_or("<missing>")))
            .collect::<Vec<_>>()
            .join("; ");
        ctx.emit(Event::Message(summary)).await;
        Ok(())
    }
}
