//! Outbound collaborators: image acquisition and the model client.

pub mod error;
pub mod image;
pub mod model_client;

pub use error::{ImageFetchError, ModelCallError};
pub use image::{HttpImageResolver, ImageRef, ImageResolver};
pub use model_client::{
    ModelClient, ModelDelta, ModelRequest, ModelStream, OpenAiClient, SseDecoder,
};
