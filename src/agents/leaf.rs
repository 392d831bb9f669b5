//! Single-shot vision analysis leaves.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use wfaas::{Event, NodeContext, NodeError, NodeResult, RunState, TaskNode};

use super::AgentDeps;
use crate::core::{ImageRef, ImageResolver, ModelClient, ModelRequest};

/// Static description of one leaf analysis.
#[derive(Debug, Clone, Copy)]
pub struct LeafSpec {
    /// Node name, also the key of its result slot.
    pub name: &'static str,
    /// Human readable report title.
    pub label: &'static str,
    pub system_prompt: &'static str,
    pub instruction: &'static str,
    /// Thought published once the analysis is done.
    pub status_line: &'static str,
}

/// Resolves the run's image once and asks the model one question about it.
pub struct AnalysisLeaf {
    spec: LeafSpec,
    client: Arc<dyn ModelClient>,
    resolver: Arc<dyn ImageResolver>,
}

impl AnalysisLeaf {
    pub fn new(
        spec: LeafSpec,
        client: Arc<dyn ModelClient>,
        resolver: Arc<dyn ImageResolver>,
    ) -> Self {
        Self {
            spec,
            client,
            resolver,
        }
    }

    pub fn spec(&self) -> &LeafSpec {
        &self.spec
    }
}

#[async_trait]
impl TaskNode for AnalysisLeaf {
    fn name(&self) -> &str {
        self.spec.name
    }

    async fn run(&self, ctx: &NodeContext) -> NodeResult<String> {
        let analysis = async {
            let image = shared_image(ctx, self.resolver.as_ref()).await?;
            let request =
                ModelRequest::vision(self.spec.system_prompt, self.spec.instruction, image);
            self.client
                .complete(request)
                .await
                .map_err(NodeError::model_call)
        };

        let text = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(NodeError::Cancelled),
            text = analysis => text?,
        };

        ctx.emit(Event::Thought(format!("{}\n", self.spec.status_line)))
            .await;
        debug!(node = self.spec.name, len = text.len(), "leaf analysis complete");
        Ok(text)
    }

    fn failure_placeholder(&self, err: &NodeError) -> String {
        format!("{} failed: {}", self.spec.label, err)
    }
}

/// One [`AnalysisLeaf`] per entry of `specs`, sharing the deps' collaborators.
pub(crate) fn analysis_leaves(specs: &[LeafSpec], deps: &AgentDeps) -> Vec<Arc<dyn TaskNode>> {
    specs
        .iter()
        .map(|spec| {
            Arc::new(AnalysisLeaf::new(
                *spec,
                Arc::clone(&deps.client),
                Arc::clone(&deps.resolver),
            )) as Arc<dyn TaskNode>
        })
        .collect()
}

/// The run's image, resolved through `resolver` on first use.
pub(crate) async fn shared_image(
    ctx: &NodeContext,
    resolver: &dyn ImageResolver,
) -> NodeResult<ImageRef> {
    let image = ctx
        .state
        .image(|source| async move {
            resolver
                .resolve(&source)
                .await
                .map(ImageRef::into_string)
                .map_err(NodeError::image_fetch)
        })
        .await?;
    Ok(ImageRef::new(image))
}

/// Every leaf report under its label, in leaf order.
pub(crate) fn combined_report(state: &RunState, leaves: &[LeafSpec]) -> String {
    leaves
        .iter()
        .map(|leaf| {
            let report = state
                .result(leaf.name)
                .unwrap_or_else(|| format!("No {} available.", leaf.label.to_lowercase()));
            format!("[{}]\n{}", leaf.label, report)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
