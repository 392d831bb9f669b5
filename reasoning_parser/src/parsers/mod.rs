// Marker scheme implementations.

pub mod base;
pub mod bracket;
pub mod sentinel;
pub mod think_answer;

pub use base::BaseReasoningParser;
pub use bracket::BracketParser;
pub use sentinel::SentinelParser;
pub use think_answer::ThinkAnswerParser;
