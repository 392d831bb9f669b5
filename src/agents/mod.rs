//! Food analysis flows built on the task graph executor.

pub mod calories;
pub mod check_premade;
pub mod leaf;
pub mod orchestrator;
pub mod payload;
pub mod presets;
pub mod prompts;
pub mod streaming;
pub mod where_to_eat;

use std::sync::Arc;

use reasoning_parser::{ParserFactory, ParserResult, ReasoningParser, SentinelParser};

pub use calories::CaloriesAggregator;
pub use check_premade::PremadeAggregator;
pub use leaf::{AnalysisLeaf, LeafSpec};
pub use orchestrator::{Flow, FlowInput, Orchestrator};
pub use payload::StructuredPayloadParseError;
pub use streaming::{stream_classified, FencedJsonFilter, StreamOptions, StreamOutcome};
pub use where_to_eat::WhereToEatNode;

use crate::core::{ImageResolver, ModelClient};

/// Collaborators shared by every node of every flow.
#[derive(Clone)]
pub struct AgentDeps {
    pub client: Arc<dyn ModelClient>,
    pub resolver: Arc<dyn ImageResolver>,
    parsers: ParserFactory,
    scheme: String,
}

impl AgentDeps {
    /// Fails if `scheme` is not registered with `parsers`.
    pub fn new(
        client: Arc<dyn ModelClient>,
        resolver: Arc<dyn ImageResolver>,
        parsers: ParserFactory,
        scheme: impl Into<String>,
    ) -> ParserResult<Self> {
        let scheme = scheme.into();
        parsers.create(&scheme)?;
        Ok(Self {
            client,
            resolver,
            parsers,
            scheme,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// A fresh classifier for one model call.
    pub fn parser(&self) -> Box<dyn ReasoningParser> {
        // The scheme was checked in `new`.
        self.parsers
            .create(&self.scheme)
            .unwrap_or_else(|_| Box::new(SentinelParser::new()))
    }
}
