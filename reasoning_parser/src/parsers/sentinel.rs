//! Sentinel scheme reasoning parser.
//!
//! Regions are delimited by toggle sentinels: `@@@reason-content@@@` opens a
//! thought region and closes it again on its next occurrence, `@@@answer@@@`
//! does the same for the answer region.

use crate::{
    parsers::BaseReasoningParser,
    traits::{ClassifierState, MarkerPair, ParsedResult, ParserConfig, ReasoningParser, Segment},
};

pub const THOUGHT_SENTINEL: &str = "@@@reason-content@@@";
pub const ANSWER_SENTINEL: &str = "@@@answer@@@";

/// Default scheme used by the analysis prompts.
pub struct SentinelParser {
    base: BaseReasoningParser,
}

impl SentinelParser {
    pub fn new() -> Self {
        let config = ParserConfig::new(
            MarkerPair::toggle(THOUGHT_SENTINEL),
            MarkerPair::toggle(ANSWER_SENTINEL),
        );

        Self {
            base: BaseReasoningParser::from_trusted(config).with_model_type("sentinel"),
        }
    }
}

impl Default for SentinelParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ReasoningParser for SentinelParser {
    fn process_chunk(&mut self, chunk: &str) -> Vec<Segment> {
        self.base.process_chunk(chunk)
    }

    fn flush(&mut self) -> Vec<Segment> {
        self.base.flush()
    }

    fn parsed(&self) -> ParsedResult {
        self.base.parsed()
    }

    fn reset(&mut self) {
        self.base.reset()
    }

    fn state(&self) -> ClassifierState {
        self.base.state()
    }

    fn scheme(&self) -> &str {
        self.base.scheme()
    }

    fn markers(&self) -> &ParserConfig {
        self.base.config()
    }
}
