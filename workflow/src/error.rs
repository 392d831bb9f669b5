use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type NodeResult<T> = Result<T, NodeError>;

/// Failure of a single node.
///
/// Leaf failures are converted into placeholder text and never abort the run;
/// a failure of the final node ends the run with an error event.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("image fetch failed: {0}")]
    ImageFetch(#[source] BoxError),

    #[error("model call failed: {0}")]
    ModelCall(#[source] BoxError),

    #[error("run cancelled")]
    Cancelled,

    #[error("node panicked: {0}")]
    Panicked(String),
}

impl NodeError {
    pub fn image_fetch(err: impl Into<BoxError>) -> Self {
        NodeError::ImageFetch(err.into())
    }

    pub fn model_call(err: impl Into<BoxError>) -> Self {
        NodeError::ModelCall(err.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, NodeError::Cancelled)
    }
}
