//! Flow registry: maps a request to its task graph and runs it.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wfaas::{event_channel, EventStream, NodeError, RunState, StreamNode, TaskGraph};

use super::{
    calories::{self, CaloriesAggregator},
    check_premade::{self, PremadeAggregator},
    where_to_eat::WhereToEatNode,
    AgentDeps,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    WhereToEat,
    CheckPremade,
    Calories,
}

impl Flow {
    pub const ALL: [Flow; 3] = [Flow::WhereToEat, Flow::CheckPremade, Flow::Calories];

    pub fn as_str(&self) -> &'static str {
        match self {
            Flow::WhereToEat => "where_to_eat",
            Flow::CheckPremade => "check_premade",
            Flow::Calories => "calories",
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request inputs shared by all flows; each flow reads what it needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FlowInput {
    pub file_path: String,
    pub query: Option<String>,
    pub meal_time: Option<String>,
}

impl FlowInput {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            ..Self::default()
        }
    }

    fn into_state(self) -> RunState {
        let mut state = RunState::new(self.file_path);
        if let Some(query) = self.query {
            state = state.with_query(query);
        }
        if let Some(meal_time) = self.meal_time {
            state = state.with_context(calories::MEAL_TIME_KEY, meal_time);
        }
        state
    }
}

pub struct Orchestrator {
    deps: AgentDeps,
    event_capacity: usize,
}

impl Orchestrator {
    pub fn new(deps: AgentDeps, event_capacity: usize) -> Self {
        Self {
            deps,
            event_capacity,
        }
    }

    pub fn graph_for(&self, flow: Flow) -> TaskGraph {
        let deps = self.deps.clone();
        match flow {
            Flow::WhereToEat => TaskGraph::single(Arc::new(WhereToEatNode::new(deps))),
            Flow::CheckPremade => TaskGraph::fan_out(
                check_premade::leaves(&deps),
                Arc::new(PremadeAggregator::new(deps)) as Arc<dyn StreamNode>,
            ),
            Flow::Calories => TaskGraph::fan_out(
                calories::leaves(&deps),
                Arc::new(CaloriesAggregator::new(deps)) as Arc<dyn StreamNode>,
            ),
        }
    }

    /// Start `flow` in the background and return its events.
    ///
    /// Dropping the returned stream cancels the run.
    pub fn run(&self, flow: Flow, input: FlowInput) -> EventStream {
        let (sink, stream) = event_channel(self.event_capacity);
        let graph = self.graph_for(flow);
        let state = Arc::new(input.into_state());
        let cancel = CancellationToken::new();

        info!(
            flow = %flow,
            run_id = %state.run_id(),
            image = state.image_source(),
            "starting run"
        );

        tokio::spawn(async move {
            let watcher = sink.clone();
            let execution = graph.execute(state, sink, cancel.clone());
            tokio::pin!(execution);

            let outcome = tokio::select! {
                outcome = &mut execution => outcome,
                _ = watcher.closed() => {
                    debug!(flow = %flow, "event consumer went away, cancelling run");
                    cancel.cancel();
                    execution.await
                }
            };

            match outcome {
                Ok(()) => debug!(flow = %flow, "run complete"),
                Err(NodeError::Cancelled) => info!(flow = %flow, "run cancelled"),
                Err(err) => warn!(flow = %flow, error = %err, "run failed"),
            }
        });

        stream
    }
}
