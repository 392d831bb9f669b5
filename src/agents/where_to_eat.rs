//! Single-node flow that guesses where a food photo was taken.

use async_trait::async_trait;
use tracing::{info, warn};
use wfaas::{Event, NodeContext, NodeError, NodeResult, StreamNode};

use super::{
    leaf::shared_image,
    payload, presets, prompts,
    streaming::{stream_classified, StreamOptions},
    AgentDeps,
};
use crate::core::ModelRequest;

pub const NAME: &str = "where_to_eat";

/// User turn when the request carries no query.
pub const DEFAULT_QUERY: &str = "Where is this?";

pub const NO_LOCATION_MESSAGE: &str = "\n\nNo location could be extracted from this image.";

pub struct WhereToEatNode {
    deps: AgentDeps,
}

impl WhereToEatNode {
    pub fn new(deps: AgentDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl StreamNode for WhereToEatNode {
    fn name(&self) -> &str {
        NAME
    }

    async fn run(&self, ctx: &NodeContext) -> NodeResult<()> {
        ctx.emit(Event::Thought(presets::pick(presets::WHERE_TO_EAT).to_string()))
            .await;

        let image = shared_image(ctx, self.deps.resolver.as_ref()).await?;
        let mut parser = self.deps.parser();
        let system_prompt = prompts::with_markers(prompts::WHERE_TO_EAT, parser.markers());
        let query = ctx
            .state
            .query()
            .filter(|q| !q.trim().is_empty())
            .unwrap_or(DEFAULT_QUERY);

        let outcome = stream_classified(
            ctx,
            self.deps.client.as_ref(),
            parser.as_mut(),
            ModelRequest::vision(system_prompt, query, image),
            StreamOptions {
                filter_json: true,
                forward_reasoning: true,
            },
        )
        .await?;

        let locations = payload::location_payloads(&outcome.raw);
        if locations.is_empty() {
            warn!(run_id = %ctx.state.run_id(), "no location found in model answer");
            ctx.emit(Event::Message(NO_LOCATION_MESSAGE.to_string()))
                .await;
            return Ok(());
        }

        info!(
            run_id = %ctx.state.run_id(),
            locations = locations.len(),
            "publishing map locations"
        );
        for location in locations {
            if !ctx.emit(Event::StructuredPayload(location)).await {
                return Err(NodeError::Cancelled);
            }
        }
        Ok(())
    }

    fn error_message(&self, err: &NodeError) -> String {
        format!("Location analysis failed: {err}")
    }
}
