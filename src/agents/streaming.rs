//! Drives one streamed model call through a marker classifier into the sink.

use futures::StreamExt;
use reasoning_parser::{ParsedResult, ReasoningParser, Segment, SegmentKind};
use serde_json::Value;
use tracing::debug;
use wfaas::{Event, NodeContext, NodeError, NodeResult};

use crate::core::{ModelClient, ModelDelta, ModelRequest};

const FENCE_OPEN: &str = "```json";
const FENCE_CLOSE: &str = "```";

/// Longest unclosed `{...}` span held back before it is released as prose.
const MAX_HELD_OBJECT: usize = 64 * 1024;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum FilterMode {
    #[default]
    Text,
    Fenced,
    Object(ObjectScan),
}

/// Brace matching state for a candidate object starting at `pending[0]`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct ObjectScan {
    depth: usize,
    in_string: bool,
    escaped: bool,
    scanned: usize,
}

impl ObjectScan {
    /// Byte offset just past the matching `}`, if `text` holds it yet.
    fn advance(&mut self, text: &str) -> Option<usize> {
        let bytes = text.as_bytes();
        while self.scanned < bytes.len() {
            let b = bytes[self.scanned];
            self.scanned += 1;
            if self.in_string {
                match b {
                    _ if self.escaped => self.escaped = false,
                    b'\\' => self.escaped = true,
                    b'"' => self.in_string = false,
                    _ => {}
                }
                continue;
            }
            match b {
                b'"' => self.in_string = true,
                b'{' => self.depth += 1,
                b'}' => {
                    self.depth = self.depth.saturating_sub(1);
                    if self.depth == 0 {
                        return Some(self.scanned);
                    }
                }
                _ => {}
            }
        }
        None
    }
}

/// Strips raw JSON from a text stream: ```` ```json ```` fenced blocks and
/// loose `{...}` spans that parse as a JSON object.
///
/// Fences and objects may be split across pushes; text that could still
/// become either is held until the next push or [`FencedJsonFilter::finish`].
/// Brace spans that turn out not to be JSON are released unchanged.
#[derive(Debug, Default)]
pub struct FencedJsonFilter {
    pending: String,
    mode: FilterMode,
}

impl FencedJsonFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed text and return the part that is safe to show.
    pub fn push(&mut self, text: &str) -> String {
        self.pending.push_str(text);
        let mut visible = String::new();
        self.drain(&mut visible);
        visible
    }

    /// Release held text. An unterminated fence stays hidden; an unclosed
    /// brace is prose.
    pub fn finish(&mut self) -> String {
        let mut visible = String::new();
        while matches!(self.mode, FilterMode::Object(_)) {
            self.release_brace(&mut visible);
            self.drain(&mut visible);
        }
        let rest = std::mem::take(&mut self.pending);
        if std::mem::take(&mut self.mode) == FilterMode::Text {
            visible.push_str(&rest);
        }
        visible
    }

    fn drain(&mut self, visible: &mut String) {
        loop {
            match self.mode {
                FilterMode::Fenced => match self.pending.find(FENCE_CLOSE) {
                    Some(pos) => {
                        self.pending.drain(..pos + FENCE_CLOSE.len());
                        self.mode = FilterMode::Text;
                    }
                    None => {
                        let keep = held_suffix_len(&self.pending, FENCE_CLOSE);
                        let cut = self.pending.len() - keep;
                        self.pending.drain(..cut);
                        return;
                    }
                },
                FilterMode::Text => {
                    let fence = self.pending.find(FENCE_OPEN);
                    let brace = self.pending.find('{');
                    let fence_first = match (fence, brace) {
                        (Some(f), Some(b)) => f < b,
                        (fence, _) => fence.is_some(),
                    };
                    match (fence, brace) {
                        (Some(f), _) if fence_first => {
                            visible.push_str(&self.pending[..f]);
                            self.pending.drain(..f + FENCE_OPEN.len());
                            self.mode = FilterMode::Fenced;
                        }
                        (_, Some(b)) => {
                            visible.extend(self.pending.drain(..b));
                            self.mode = FilterMode::Object(ObjectScan::default());
                        }
                        _ => {
                            let keep = held_suffix_len(&self.pending, FENCE_OPEN);
                            let cut = self.pending.len() - keep;
                            visible.extend(self.pending.drain(..cut));
                            return;
                        }
                    }
                }
                FilterMode::Object(mut scan) => match scan.advance(&self.pending) {
                    Some(end) => {
                        let is_object = matches!(
                            serde_json::from_str::<Value>(&self.pending[..end]),
                            Ok(Value::Object(_))
                        );
                        if is_object {
                            self.pending.drain(..end);
                            self.mode = FilterMode::Text;
                        } else {
                            self.release_brace(visible);
                        }
                    }
                    None if self.pending.len() > MAX_HELD_OBJECT => self.release_brace(visible),
                    None => {
                        self.mode = FilterMode::Object(scan);
                        return;
                    }
                },
            }
        }
    }

    /// Give up on the candidate object: its `{` is prose, rescan the rest.
    fn release_brace(&mut self, visible: &mut String) {
        visible.push('{');
        self.pending.drain(..1);
        self.mode = FilterMode::Text;
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of `token`.
fn held_suffix_len(text: &str, token: &str) -> usize {
    let max = token.len().saturating_sub(1).min(text.len());
    (1..=max)
        .rev()
        .find(|&n| text.is_char_boundary(text.len() - n) && token.starts_with(&text[text.len() - n..]))
        .unwrap_or(0)
}

/// How a classified call surfaces its output.
#[derive(Debug, Clone, Copy)]
pub struct StreamOptions {
    /// Hide raw JSON from Message events.
    pub filter_json: bool,
    /// Publish provider reasoning deltas as Thought events.
    pub forward_reasoning: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            filter_json: true,
            forward_reasoning: false,
        }
    }
}

/// Everything a finished classified call produced.
#[derive(Debug, Clone, Default)]
pub struct StreamOutcome {
    /// Raw content exactly as received, markers included.
    pub raw: String,
    pub parsed: ParsedResult,
    /// Out-of-band provider reasoning.
    pub reasoning: String,
}

struct Publisher<'a> {
    ctx: &'a NodeContext,
    filter: Option<FencedJsonFilter>,
}

impl Publisher<'_> {
    async fn segment(&mut self, segment: Segment) {
        match segment.kind {
            SegmentKind::Thought => {
                self.ctx.emit(Event::Thought(segment.content)).await;
            }
            SegmentKind::Message => {
                let text = match &mut self.filter {
                    Some(filter) => filter.push(&segment.content),
                    None => segment.content,
                };
                self.message(text).await;
            }
        }
    }

    async fn message(&self, text: String) {
        if !text.is_empty() {
            self.ctx.emit(Event::Message(text)).await;
        }
    }

    async fn finish(&mut self) {
        if let Some(filter) = &mut self.filter {
            let tail = filter.finish();
            self.message(tail).await;
        }
    }
}

/// Stream `request` through `parser`, publishing every segment as it resolves.
///
/// Returns [`NodeError::Cancelled`] if the run is cancelled mid-stream.
pub async fn stream_classified(
    ctx: &NodeContext,
    client: &dyn ModelClient,
    parser: &mut dyn ReasoningParser,
    request: ModelRequest,
    options: StreamOptions,
) -> NodeResult<StreamOutcome> {
    let mut stream = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => return Err(NodeError::Cancelled),
        started = client.stream_call(request) => started.map_err(NodeError::model_call)?,
    };

    let mut publisher = Publisher {
        ctx,
        filter: options.filter_json.then(FencedJsonFilter::new),
    };
    let mut outcome = StreamOutcome::default();

    loop {
        let next = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(NodeError::Cancelled),
            next = stream.next() => next,
        };
        let Some(delta) = next else {
            break;
        };

        match delta.map_err(NodeError::model_call)? {
            ModelDelta::Content(text) => {
                outcome.raw.push_str(&text);
                for segment in parser.process_chunk(&text) {
                    publisher.segment(segment).await;
                }
            }
            ModelDelta::Reasoning(text) => {
                outcome.reasoning.push_str(&text);
                if options.forward_reasoning {
                    ctx.emit(Event::Thought(text)).await;
                }
            }
        }
    }

    for segment in parser.flush() {
        publisher.segment(segment).await;
    }
    publisher.finish().await;

    outcome.parsed = parser.parsed();
    debug!(
        raw_len = outcome.raw.len(),
        thought_len = outcome.parsed.thought.len(),
        answer_len = outcome.parsed.answer.len(),
        reasoning_len = outcome.reasoning.len(),
        "classified stream complete"
    );
    Ok(outcome)
}
