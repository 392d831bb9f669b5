//! Fan-out/aggregate execution.

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc, time::Instant};

use futures::FutureExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::{
    error::{NodeError, NodeResult},
    event::{Event, EventSink},
    node::{NodeContext, StreamNode, TaskNode},
    state::RunState,
};

/// Leaves run concurrently; the final node runs once, after all of them.
#[derive(Clone)]
pub struct TaskGraph {
    leaves: Vec<Arc<dyn TaskNode>>,
    root: Arc<dyn StreamNode>,
}

impl TaskGraph {
    /// A graph with no leaves.
    pub fn single(node: Arc<dyn StreamNode>) -> Self {
        Self {
            leaves: Vec::new(),
            root: node,
        }
    }

    pub fn fan_out(leaves: Vec<Arc<dyn TaskNode>>, aggregator: Arc<dyn StreamNode>) -> Self {
        Self {
            leaves,
            root: aggregator,
        }
    }

    pub fn leaf_names(&self) -> Vec<&str> {
        self.leaves.iter().map(|leaf| leaf.name()).collect()
    }

    pub fn root_name(&self) -> &str {
        self.root.name()
    }

    /// Run the graph to completion.
    ///
    /// Leaf failures are recorded as placeholders. A failure of the final
    /// node, panics included, is published as a single [`Event::Error`] and
    /// returned.
    pub async fn execute(
        &self,
        state: Arc<RunState>,
        sink: EventSink,
        cancel: CancellationToken,
    ) -> NodeResult<()> {
        let span = info_span!(
            "task_graph",
            run_id = %state.run_id(),
            root = self.root.name(),
            leaves = self.leaves.len()
        );
        let ctx = NodeContext::new(state, sink, cancel);

        async move {
            let started = Instant::now();
            self.run_leaves(&ctx).await?;

            if ctx.is_cancelled() {
                return Err(NodeError::Cancelled);
            }
            debug!("all leaves complete, running final node");

            let outcome = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => Err(NodeError::Cancelled),
                result = AssertUnwindSafe(self.root.run(&ctx)).catch_unwind() => {
                    result.unwrap_or_else(|panic| Err(NodeError::Panicked(panic_message(panic.as_ref()))))
                }
            };

            match outcome {
                Ok(()) => {
                    info!(
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "task graph finished"
                    );
                    Ok(())
                }
                Err(NodeError::Cancelled) => {
                    info!("task graph cancelled");
                    Err(NodeError::Cancelled)
                }
                Err(err) => {
                    error!(node = self.root.name(), error = %err, "final node failed");
                    ctx.sink
                        .publish(Event::Error(self.root.error_message(&err)))
                        .await;
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_leaves(&self, ctx: &NodeContext) -> NodeResult<()> {
        if self.leaves.is_empty() {
            return Ok(());
        }
        ctx.state.seed_results(self.leaves.iter().map(|leaf| leaf.name()));

        let mut set = JoinSet::new();
        for (idx, leaf) in self.leaves.iter().enumerate() {
            let leaf = Arc::clone(leaf);
            let ctx = ctx.clone();
            set.spawn(
                async move {
                    let started = Instant::now();
                    let outcome = AssertUnwindSafe(leaf.run(&ctx)).catch_unwind().await;
                    (idx, outcome, started.elapsed())
                }
                .in_current_span(),
            );
        }

        while !set.is_empty() {
            let joined = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => {
                    set.abort_all();
                    return Err(NodeError::Cancelled);
                }
                joined = set.join_next() => joined,
            };
            let Some(joined) = joined else {
                break;
            };

            let (idx, outcome, elapsed) = match joined {
                Ok(done) => done,
                Err(err) => {
                    warn!(error = %err, "leaf task did not complete");
                    continue;
                }
            };
            let leaf = &self.leaves[idx];
            let elapsed_ms = elapsed.as_millis() as u64;

            let text = match outcome {
                Ok(Ok(text)) => {
                    debug!(leaf = leaf.name(), elapsed_ms, "leaf complete");
                    text
                }
                Ok(Err(err)) => {
                    warn!(leaf = leaf.name(), elapsed_ms, error = %err, "leaf failed, recording placeholder");
                    leaf.failure_placeholder(&err)
                }
                Err(panic) => {
                    let err = NodeError::Panicked(panic_message(panic.as_ref()));
                    error!(leaf = leaf.name(), error = %err, "leaf panicked, recording placeholder");
                    leaf.failure_placeholder(&err)
                }
            };
            ctx.state.record_result(leaf.name(), text);
        }

        // Slots still empty belong to tasks lost to a runtime-level failure.
        for leaf in &self.leaves {
            if ctx.state.result(leaf.name()).is_none() {
                let err = NodeError::Panicked("task did not complete".to_string());
                ctx.state
                    .record_result(leaf.name(), leaf.failure_placeholder(&err));
            }
        }

        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
