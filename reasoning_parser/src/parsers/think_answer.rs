// Tag-pair reasoning parser: <think>...</think> and <answer>...</answer>.

use crate::{
    parsers::BaseReasoningParser,
    traits::{ClassifierState, MarkerPair, ParsedResult, ParserConfig, ReasoningParser, Segment},
};

/// XML-style tag scheme.
///
/// Unlike the sentinel scheme, open and close tokens are distinct, so a
/// stray `</think>` outside a thought region is consumed without effect.
pub struct ThinkAnswerParser {
    base: BaseReasoningParser,
}

impl ThinkAnswerParser {
    pub fn new() -> Self {
        let config = ParserConfig::new(
            MarkerPair::new("<think>", "</think>"),
            MarkerPair::new("<answer>", "</answer>"),
        );

        Self {
            base: BaseReasoningParser::from_trusted(config).with_model_type("think_answer"),
        }
    }
}

impl Default for ThinkAnswerParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ReasoningParser for ThinkAnswerParser {
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
