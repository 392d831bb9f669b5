//! Streaming classifier for model output that marks its thinking and its
//! final answer with in-band sentinel tokens.
//!
//! A parser consumes text increments in arrival order and emits ordered
//! [`Segment`]s tagged [`SegmentKind::Thought`] or [`SegmentKind::Message`].
//! Marker tokens may be split across any number of chunks; they are never
//! emitted as content, and no other byte is lost or duplicated.
//!
//! ```
//! use reasoning_parser::{ParserFactory, ReasoningParser};
//!
//! let factory = ParserFactory::new();
//! let mut parser = factory.create("bracket").unwrap();
//! parser.process_chunk("[T]I thi");
//! parser.process_chunk("nk pork[/T][A]It'");
//! parser.process_chunk("s at the lake[/A]");
//! parser.flush();
//!
//! let parsed = parser.parsed();
//! assert_eq!(parsed.thought, "I think pork");
//! assert_eq!(parsed.answer, "It's at the lake");
//! ```

pub mod factory;
pub mod parsers;
pub mod traits;

pub use factory::{ParserFactory, ParserRegistry};
pub use parsers::{BaseReasoningParser, BracketParser, SentinelParser, ThinkAnswerParser};
pub use traits::{
    ClassifierState, MarkerPair, ParseError, ParsedResult, ParserConfig, ParserResult, Piece,
    ReasoningParser, Segment, SegmentKind,
};
