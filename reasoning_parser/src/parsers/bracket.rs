//! Compact bracket scheme: `[T]...[/T]` and `[A]...[/A]`.

use crate::{
    parsers::BaseReasoningParser,
    traits::{ClassifierState, MarkerPair, ParsedResult, ParserConfig, ReasoningParser, Segment},
};

pub struct BracketParser {
    base: BaseReasoningParser,
}

impl BracketParser {
    pub fn new() -> Self {
        let config = ParserConfig::new(
            MarkerPair::new("[T]", "[/T]"),
            MarkerPair::new("[A]", "[/A]"),
        );

        Self {
            base: BaseReasoningParser::from_trusted(config).with_model_type("bracket"),
        }
    }
}

impl Default for BracketParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ReasoningParser for BracketParser {
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
