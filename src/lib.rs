//! Streaming food image analysis gateway.
//!
//! Requests start a flow: one or more concurrent vision calls whose reports
//! feed a final streamed call. Model output is split into thought and answer
//! regions by a marker classifier and delivered as server-sent events.

pub mod agents;
pub mod config;
pub mod core;
pub mod observability;
pub mod routers;
pub mod server;
