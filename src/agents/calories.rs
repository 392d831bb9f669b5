//! Three-leaf flow estimating calories and the exercise to burn them.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use wfaas::{Event, NodeContext, NodeError, NodeResult, StreamNode, TaskNode};

use super::{
    leaf::{analysis_leaves, combined_report, LeafSpec},
    payload, presets, prompts,
    streaming::{stream_classified, StreamOptions},
    AgentDeps,
};
use crate::core::ModelRequest;

pub const NAME: &str = "calories";

/// Run context key for the meal being analysed.
pub const MEAL_TIME_KEY: &str = "meal_time";
pub const DEFAULT_MEAL_TIME: &str = "lunch";

pub const FOOD_IDENTIFICATION: LeafSpec = LeafSpec {
    name: "food_identification",
    label: "Food identification",
    system_prompt: prompts::FOOD_IDENTIFICATION,
    instruction: "Identify every food item in this image.",
    status_line: "Identifying the food in the image...",
};

pub const CALORIE_ESTIMATION: LeafSpec = LeafSpec {
    name: "calorie_estimation",
    label: "Calorie estimation",
    system_prompt: prompts::CALORIE_ESTIMATION,
    instruction: "Estimate the calories of every food item in this image.",
    status_line: "Estimating calories...",
};

pub const EXERCISE_ESTIMATION: LeafSpec = LeafSpec {
    name: "exercise_estimation",
    label: "Exercise estimation",
    system_prompt: prompts::EXERCISE_ESTIMATION,
    instruction: "How much exercise burns off the food in this image?",
    status_line: "Working out the exercise needed...",
};

pub const LEAVES: [LeafSpec; 3] = [FOOD_IDENTIFICATION, CALORIE_ESTIMATION, EXERCISE_ESTIMATION];

pub fn leaves(deps: &AgentDeps) -> Vec<Arc<dyn TaskNode>> {
    analysis_leaves(&LEAVES, deps)
}

/// Streams the calorie report and publishes its `calories_result` payload.
pub struct CaloriesAggregator {
    deps: AgentDeps,
}

impl CaloriesAggregator {
    pub fn new(deps: AgentDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl StreamNode for CaloriesAggregator {
    fn name(&self) -> &str {
        NAME
    }

    async fn run(&self, ctx: &NodeContext) -> NodeResult<()> {
        let status = format!(
            "{}\nCombining the results...",
            presets::pick(presets::CALORIES)
        );
        ctx.emit(Event::Thought(status)).await;

        let meal_time = ctx
            .state
            .context(MEAL_TIME_KEY)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(DEFAULT_MEAL_TIME);

        let mut parser = self.deps.parser();
        let system_prompt =
            prompts::with_markers(&prompts::calories_prompt(meal_time), parser.markers());
        let user_text = format!(
            "{}\n\nMeal time: {meal_time}\n\nWrite the combined analysis from the reports above.",
            combined_report(&ctx.state, &LEAVES)
        );

        let outcome = stream_classified(
            ctx,
            self.deps.client.as_ref(),
            parser.as_mut(),
            ModelRequest::text(system_prompt, user_text),
            StreamOptions::default(),
        )
        .await?;

        let extracted = payload::calories_payload(&outcome.parsed.answer)
            .or_else(|_| payload::calories_payload(&outcome.raw));
        match extracted {
            Ok(result) => {
                info!(
                    run_id = %ctx.state.run_id(),
                    total_calories = %result["total_calories"],
                    "publishing calories result"
                );
                if !ctx.emit(Event::StructuredPayload(result)).await {
                    return Err(NodeError::Cancelled);
                }
            }
            Err(err) => {
                warn!(run_id = %ctx.state.run_id(), error = %err, "calories payload not extracted");
            }
        }
        Ok(())
    }

    fn error_message(&self, err: &NodeError) -> String {
        format!("Calorie analysis failed: {err}")
    }
}
