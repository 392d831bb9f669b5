//! Marker-driven region classifier shared by every scheme.
//!
//! The buffer only ever holds a suffix that could still turn into a marker,
//! so memory is bounded by the longest configured token regardless of how
//! much text flows through.

use tracing::trace;

use crate::traits::{
    ClassifierState, ParsedResult, ParserConfig, ParserResult, Piece, ReasoningParser, Segment,
    SegmentKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    ThoughtOpen,
    ThoughtClose,
    AnswerOpen,
    AnswerClose,
}

/// One distinct literal and every role it plays. A toggle sentinel carries
/// both the open and the close role of its region.
#[derive(Debug, Clone)]
struct MarkerToken {
    literal: String,
    roles: Vec<Role>,
}

impl MarkerToken {
    fn has(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// Base parser implementing the incremental segmenter.
///
/// Scheme-specific parsers wrap this with a fixed [`ParserConfig`].
#[derive(Debug, Clone)]
pub struct BaseReasoningParser {
    config: ParserConfig,
    markers: Vec<MarkerToken>,
    longest: usize,
    buffer: String,
    state: ClassifierState,
    thought: String,
    answer: String,
    model_type: String,
}

impl BaseReasoningParser {
    /// Build a parser from a user-supplied configuration.
    pub fn new(config: ParserConfig) -> ParserResult<Self> {
        config.validate()?;
        Ok(Self::from_trusted(config))
    }

    /// Build from a configuration known to be valid (the built-in schemes).
    pub(crate) fn from_trusted(config: ParserConfig) -> Self {
        let mut markers: Vec<MarkerToken> = Vec::with_capacity(4);
        let roles = [
            (&config.thought.open, Role::ThoughtOpen),
            (&config.thought.close, Role::ThoughtClose),
            (&config.answer.open, Role::AnswerOpen),
            (&config.answer.close, Role::AnswerClose),
        ];
        for (literal, role) in roles {
            match markers.iter_mut().find(|m| m.literal == *literal) {
                Some(existing) => existing.roles.push(role),
                None => markers.push(MarkerToken {
                    literal: literal.clone(),
                    roles: vec![role],
                }),
            }
        }

        let longest = config.longest_marker();
        Self {
            config,
            markers,
            longest,
            buffer: String::new(),
            state: ClassifierState::Idle,
            thought: String::new(),
            answer: String::new(),
            model_type: "base".to_string(),
        }
    }

    /// Set the scheme name reported by [`ReasoningParser::scheme`].
    pub fn with_model_type(mut self, model_type: impl Into<String>) -> Self {
        self.model_type = model_type.into();
        self
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Feed a chunk and return every resolved piece, markers included.
    pub fn feed(&mut self, chunk: &str) -> Vec<Piece> {
        if chunk.is_empty() {
            return Vec::new();
        }
        self.buffer.push_str(chunk);
        self.drain(false)
    }

    /// Resolve everything still buffered and return to `Idle`.
    pub fn finish(&mut self) -> Vec<Piece> {
        let pieces = self.drain(true);
        self.state = ClassifierState::Idle;
        pieces
    }

    fn drain(&mut self, finishing: bool) -> Vec<Piece> {
        let mut pieces = Vec::new();

        loop {
            let found = self.find_earliest();
            let partial = if finishing {
                None
            } else {
                self.partial_suffix_start()
            };

            match found {
                Some((pos, idx)) if partial.map_or(true, |q| q > pos) => {
                    let content: String = self.buffer.drain(..pos).collect();
                    self.emit(content, &mut pieces);

                    let literal = self.markers[idx].literal.clone();
                    self.buffer.drain(..literal.len());

                    let role = self.select_role(idx);
                    let next = Self::transition(self.state, role);
                    trace!(
                        marker = %literal,
                        from = ?self.state,
                        to = ?next,
                        "reasoning marker consumed"
                    );
                    self.state = next;
                    pieces.push(Piece::Marker(literal));
                }
                _ => {
                    let cut = partial.unwrap_or(self.buffer.len());
                    let content: String = self.buffer.drain(..cut).collect();
                    self.emit(content, &mut pieces);
                    break;
                }
            }
        }

        pieces
    }

    /// Earliest complete marker in the buffer; the longest literal wins ties.
    fn find_earliest(&self) -> Option<(usize, usize)> {
        let mut best: Option<(usize, usize)> = None;
        for (idx, marker) in self.markers.iter().enumerate() {
            let Some(pos) = self.buffer.find(&marker.literal) else {
                continue;
            };
            best = match best {
                None => Some((pos, idx)),
                Some((best_pos, best_idx)) => {
                    let longer = marker.literal.len() > self.markers[best_idx].literal.len();
                    if pos < best_pos || (pos == best_pos && longer) {
                        Some((pos, idx))
                    } else {
                        Some((best_pos, best_idx))
                    }
                }
            };
        }
        best
    }

    /// Start of the longest buffer suffix that is a proper prefix of a marker.
    fn partial_suffix_start(&self) -> Option<usize> {
        let len = self.buffer.len();
        let window = self.longest.saturating_sub(1).min(len);
        let mut start = len - window;
        while !self.buffer.is_char_boundary(start) {
            start += 1;
        }

        (start..len)
            .filter(|&i| self.buffer.is_char_boundary(i))
            .find(|&i| {
                let tail = &self.buffer[i..];
                self.markers
                    .iter()
                    .any(|m| m.literal.len() > tail.len() && m.literal.starts_with(tail))
            })
    }

    /// Role of the literal at `idx` in the current state.
    ///
    /// `ParserConfig::validate` keeps the thought and answer pairs disjoint,
    /// so a literal holds several roles only as the open and close of one
    /// toggle pair. Any other literal has exactly one role.
    fn select_role(&self, idx: usize) -> Role {
        let marker = &self.markers[idx];
        let thought_toggle = marker.has(Role::ThoughtOpen) && marker.has(Role::ThoughtClose);
        let answer_toggle = marker.has(Role::AnswerOpen) && marker.has(Role::AnswerClose);

        if thought_toggle {
            if self.state == ClassifierState::InThought {
                Role::ThoughtClose
            } else {
                Role::ThoughtOpen
            }
        } else if answer_toggle {
            if self.state == ClassifierState::InAnswer {
                Role::AnswerClose
            } else {
                Role::AnswerOpen
            }
        } else {
            marker.roles[0]
        }
    }

    fn transition(state: ClassifierState, role: Role) -> ClassifierState {
        use ClassifierState::*;
        match (state, role) {
            (Idle, Role::ThoughtOpen) => InThought,
            (Idle, Role::AnswerOpen) => InAnswer,
            (Idle, Role::ThoughtClose | Role::AnswerClose) => Idle,

            (InThought, Role::ThoughtOpen | Role::ThoughtClose) => Idle,
            (InThought, Role::AnswerOpen) => InAnswer,
            (InThought, Role::AnswerClose) => InThought,

            (InAnswer, Role::ThoughtOpen) => InThought,
            (InAnswer, Role::ThoughtClose) => InAnswer,
            (InAnswer, Role::AnswerOpen | Role::AnswerClose) => Idle,
        }
    }

    fn emit(&mut self, content: String, pieces: &mut Vec<Piece>) {
        if content.is_empty() {
            return;
        }
        let kind = match self.state {
            ClassifierState::InThought => SegmentKind::Thought,
            ClassifierState::Idle | ClassifierState::InAnswer => SegmentKind::Message,
        };
        match kind {
            SegmentKind::Thought => self.thought.push_str(&content),
            SegmentKind::Message => self.answer.push_str(&content),
        }
        pieces.push(Piece::Content(Segment { kind, content }));
    }
}

impl ReasoningParser for BaseReasoningParser {
    fn process_chunk(&mut self, chunk: &str) -> Vec<Segment> {
        self.feed(chunk)
            .into_iter()
            .filter_map(Piece::into_segment)
            .collect()
    }

    fn flush(&mut self) -> Vec<Segment> {
        self.finish()
            .into_iter()
            .filter_map(Piece::into_segment)
            .collect()
    }

    fn parsed(&self) -> ParsedResult {
        ParsedResult {
            thought: self.thought.clone(),
            answer: self.answer.clone(),
        }
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.thought.clear();
        self.answer.clear();
        self.state = ClassifierState::Idle;
    }

    fn state(&self) -> ClassifierState {
        self.state
    }

    fn scheme(&self) -> &str {
        &self.model_type
    }

    fn markers(&self) -> &ParserConfig {
        &self.config
    }
}
