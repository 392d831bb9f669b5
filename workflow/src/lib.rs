//! Task graph executor for streamed multi-call analyses.
//!
//! A run is a [`TaskGraph`]: zero or more independent leaf [`TaskNode`]s that
//! execute concurrently, followed by exactly one [`StreamNode`] that starts
//! only after every leaf has finished. Nodes share a [`RunState`] and publish
//! progress to an [`EventSink`]; the caller consumes the matching
//! [`EventStream`].

pub mod error;
pub mod event;
pub mod graph;
pub mod node;
pub mod state;

pub use error::{BoxError, NodeError, NodeResult};
pub use event::{event_channel, Event, EventSink, EventStream, DEFAULT_EVENT_CAPACITY};
pub use graph::TaskGraph;
pub use node::{NodeContext, StreamNode, TaskNode};
pub use state::RunState;
