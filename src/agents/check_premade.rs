//! Two-leaf flow judging whether a dish is a pre-made meal.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use wfaas::{Event, NodeContext, NodeError, NodeResult, StreamNode, TaskNode};

use super::{
    leaf::{analysis_leaves, combined_report, LeafSpec},
    presets, prompts,
    streaming::{stream_classified, StreamOptions},
    AgentDeps,
};
use crate::core::ModelRequest;

pub const NAME: &str = "check_premade";

pub const VISUAL_ANALYSIS: LeafSpec = LeafSpec {
    name: "visual_analysis",
    label: "Visual analysis",
    system_prompt: prompts::VISUAL_ANALYSIS,
    instruction: "Analyze this image.",
    status_line: "Analyzing visual features (colour, texture)...",
};

pub const PROCESS_ANALYSIS: LeafSpec = LeafSpec {
    name: "process_analysis",
    label: "Process analysis",
    system_prompt: prompts::PROCESS_ANALYSIS,
    instruction: "Analyze this image.",
    status_line: "Inferring the cooking process (wok hei, industrial traces)...",
};

pub const LEAVES: [LeafSpec; 2] = [VISUAL_ANALYSIS, PROCESS_ANALYSIS];

pub fn leaves(deps: &AgentDeps) -> Vec<Arc<dyn TaskNode>> {
    analysis_leaves(&LEAVES, deps)
}

/// Streams the final verdict from both leaf reports.
pub struct PremadeAggregator {
    deps: AgentDeps,
}

impl PremadeAggregator {
    pub fn new(deps: AgentDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl StreamNode for PremadeAggregator {
    fn name(&self) -> &str {
        NAME
    }

    async fn run(&self, ctx: &NodeContext) -> NodeResult<()> {
        let status = format!(
            "{}\nCombining the analyses...",
            presets::pick(presets::CHECK_PREMADE)
        );
        ctx.emit(Event::Thought(status)).await;

        let mut parser = self.deps.parser();
        let system_prompt = prompts::with_markers(prompts::CHECK_PREMADE, parser.markers());
        let request = ModelRequest::text(system_prompt, combined_report(&ctx.state, &LEAVES));

        let outcome = stream_classified(
            ctx,
            self.deps.client.as_ref(),
            parser.as_mut(),
            request,
            StreamOptions::default(),
        )
        .await?;

        info!(
            run_id = %ctx.state.run_id(),
            answer_len = outcome.parsed.answer.len(),
            "pre-made verdict complete"
        );
        Ok(())
    }

    fn error_message(&self, err: &NodeError) -> String {
        format!("Pre-made analysis failed: {err}")
    }
}
