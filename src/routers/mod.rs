//! HTTP surface: routes, SSE encoding and error bodies.

pub mod error;
pub mod food;
pub mod sse;

pub use sse::{encode_event, sse_response};
