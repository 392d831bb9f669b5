use std::fmt;

/// Default upper bound on the length of a single marker token.
pub const DEFAULT_MAX_MARKER_LEN: usize = 64;

/// Errors raised while configuring a parser.
///
/// Classification itself never fails: malformed or truncated marker
/// sequences are resolved by the transition table, not reported.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid parser configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown marker scheme: {0}")]
    UnknownScheme(String),
}

pub type ParserResult<T> = Result<T, ParseError>;

/// Which region the classifier is currently inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassifierState {
    #[default]
    Idle,
    InThought,
    InAnswer,
}

/// Channel a piece of content belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    Thought,
    Message,
}

impl SegmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentKind::Thought => "thought",
            SegmentKind::Message => "message",
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A run of classified content, emitted in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub content: String,
}

impl Segment {
    pub fn thought(content: impl Into<String>) -> Self {
        Self {
            kind: SegmentKind::Thought,
            content: content.into(),
        }
    }

    pub fn message(content: impl Into<String>) -> Self {
        Self {
            kind: SegmentKind::Message,
            content: content.into(),
        }
    }
}

/// Traced classifier output: either content or a marker token that was consumed.
///
/// Concatenating every piece in emission order reproduces the input exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    Content(Segment),
    Marker(String),
}

impl Piece {
    pub fn text(&self) -> &str {
        match self {
            Piece::Content(segment) => &segment.content,
            Piece::Marker(token) => token,
        }
    }

    pub fn into_segment(self) -> Option<Segment> {
        match self {
            Piece::Content(segment) => Some(segment),
            Piece::Marker(_) => None,
        }
    }
}

/// Everything a parser instance has classified so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResult {
    /// Concatenation of every Thought segment.
    pub thought: String,
    /// Concatenation of every Message segment, including content seen outside any region.
    pub answer: String,
}

impl ParsedResult {
    /// The answer trimmed, with fenced ```` ```json ```` blocks removed.
    ///
    /// Intended for summaries and logs; the raw `answer` is what streaming consumers saw.
    pub fn clean_answer(&self) -> String {
        const FENCE_OPEN: &str = "```json";
        const FENCE_CLOSE: &str = "```";

        let mut out = String::with_capacity(self.answer.len());
        let mut rest = self.answer.as_str();
        while let Some(start) = rest.find(FENCE_OPEN) {
            let body = start + FENCE_OPEN.len();
            match rest[body..].find(FENCE_CLOSE) {
                Some(end) => {
                    out.push_str(&rest[..start]);
                    rest = &rest[body + end + FENCE_CLOSE.len()..];
                }
                None => break,
            }
        }
        out.push_str(rest);
        out.trim().to_string()
    }
}

/// Open and close tokens delimiting one kind of region.
///
/// `open` and `close` may be the same literal, in which case the token toggles
/// the region: it closes the region when the parser is inside it and opens it
/// otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerPair {
    pub open: String,
    pub close: String,
}

impl MarkerPair {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }

    /// A pair whose open and close token are the same sentinel.
    pub fn toggle(token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            open: token.clone(),
            close: token,
        }
    }

    pub fn is_toggle(&self) -> bool {
        self.open == self.close
    }
}

/// Parser configuration: exactly one marker pair per region kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    pub thought: MarkerPair,
    pub answer: MarkerPair,
    /// Tokens longer than this are rejected by [`ParserConfig::validate`].
    pub max_marker_len: usize,
}

impl ParserConfig {
    pub fn new(thought: MarkerPair, answer: MarkerPair) -> Self {
        Self {
            thought,
            answer,
            max_marker_len: DEFAULT_MAX_MARKER_LEN,
        }
    }

    pub fn validate(&self) -> ParserResult<()> {
        let tokens = [
            ("thought open", &self.thought.open),
            ("thought close", &self.thought.close),
            ("answer open", &self.answer.open),
            ("answer close", &self.answer.close),
        ];

        for (label, token) in tokens {
            if token.is_empty() {
                return Err(ParseError::InvalidConfig(format!(
                    "{} token must not be empty",
                    label
                )));
            }
            if token.len() > self.max_marker_len {
                return Err(ParseError::InvalidConfig(format!(
                    "{} token is {} bytes, limit is {}",
                    label,
                    token.len(),
                    self.max_marker_len
                )));
            }
        }

        for thought_token in [&self.thought.open, &self.thought.close] {
            if *thought_token == self.answer.open || *thought_token == self.answer.close {
                return Err(ParseError::InvalidConfig(format!(
                    "token '{}' is used by both the thought and the answer pair",
                    thought_token
                )));
            }
        }

        Ok(())
    }

    /// Length in bytes of the longest configured token.
    pub fn longest_marker(&self) -> usize {
        [
            &self.thought.open,
            &self.thought.close,
            &self.answer.open,
            &self.answer.close,
        ]
        .iter()
        .map(|t| t.len())
        .max()
        .unwrap_or(0)
    }
}

/// Incremental classifier over a marker-delimited text stream.
pub trait ReasoningParser: Send + Sync {
    /// Feed the next increment and return the segments that are now unambiguous.
    ///
    /// A trailing fragment that could still be the start of a marker is held
    /// back until more input (or [`ReasoningParser::flush`]) resolves it.
    fn process_chunk(&mut self, chunk: &str) -> Vec<Segment>;

    /// Release everything still buffered, tagged by the current state, and
    /// return to `Idle`. A second flush yields nothing.
    fn flush(&mut self) -> Vec<Segment>;

    /// Snapshot of all thought/answer content emitted so far.
    fn parsed(&self) -> ParsedResult;

    /// Clear buffers, accumulators and state.
    fn reset(&mut self);

    fn state(&self) -> ClassifierState;

    /// Name of the marker scheme this parser recognises.
    fn scheme(&self) -> &str;

    /// The marker pairs in use.
    fn markers(&self) -> &ParserConfig;

    fn is_in_reasoning(&self) -> bool {
        self.state() == ClassifierState::InThought
    }

    /// Classify a complete response in one call.
    fn detect_and_parse(&mut self, text: &str) -> ParsedResult {
        self.reset();
        self.process_chunk(text);
        self.flush();
        self.parsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bracket_config() -> ParserConfig {
        ParserConfig::new(MarkerPair::new("[T]", "[/T]"), MarkerPair::new("[A]", "[/A]"))
    }

    #[test]
    fn test_validate_accepts_distinct_tokens() {
        assert!(bracket_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_token() {
        let mut config = bracket_config();
        config.answer.close = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("answer close"));
    }

    #[test]
    fn test_validate_rejects_shared_token() {
        let config = ParserConfig::new(MarkerPair::toggle("@@"), MarkerPair::new("@@", "##"));
        assert!(matches!(
            config.validate(),
            Err(ParseError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_oversized_token() {
        let mut config = bracket_config();
        config.max_marker_len = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_longest_marker() {
        assert_eq!(bracket_config().longest_marker(), 4);
    }

    #[test]
    fn test_clean_answer_strips_json_fences() {
        let parsed = ParsedResult {
            thought: String::new(),
            answer: "  It's here.\n```json\n{\"a\": 1}\n```\nEnjoy!  ".to_string(),
        };
        assert_eq!(parsed.clean_answer(), "It's here.\n\nEnjoy!");
    }

    #[test]
    fn test_clean_answer_keeps_unterminated_fence() {
        let parsed = ParsedResult {
            thought: String::new(),
            answer: "text ```json {\"a\": 1}".to_string(),
        };
        assert_eq!(parsed.clean_answer(), "text ```json {\"a\": 1}");
    }
}
