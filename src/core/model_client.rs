//! Streaming client for OpenAI-compatible chat completion endpoints.

use std::{
    collections::VecDeque,
    pin::Pin,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use bytes::Bytes;
use futures::{stream::BoxStream, Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{error::ModelCallError, image::ImageRef};
use crate::config::LlmConfig;

/// Cap on the upstream error body kept in [`ModelCallError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Largest unterminated SSE frame held from the upstream (1 MiB).
pub const MAX_SSE_BUFFER_SIZE: usize = 1024 * 1024;

/// One model call: a system prompt and a user turn with an optional image.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system_prompt: String,
    pub user_text: String,
    pub image: Option<ImageRef>,
}

impl ModelRequest {
    pub fn text(system_prompt: impl Into<String>, user_text: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_text: user_text.into(),
            image: None,
        }
    }

    pub fn vision(
        system_prompt: impl Into<String>,
        user_text: impl Into<String>,
        image: ImageRef,
    ) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_text: user_text.into(),
            image: Some(image),
        }
    }

    /// Chat messages in the OpenAI wire shape.
    pub fn messages(&self) -> Value {
        let user_content = match &self.image {
            Some(image) => json!([
                {"type": "text", "text": self.user_text},
                {"type": "image_url", "image_url": {"url": image.as_str()}}
            ]),
            None => Value::String(self.user_text.clone()),
        };
        json!([
            {"role": "system", "content": self.system_prompt},
            {"role": "user", "content": user_content}
        ])
    }
}

/// An increment of model output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelDelta {
    /// Regular completion text, possibly carrying in-band markers.
    Content(String),
    /// Provider-side reasoning delivered out of band.
    Reasoning(String),
}

pub type ModelStream = Pin<Box<dyn Stream<Item = Result<ModelDelta, ModelCallError>> + Send>>;

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Start a call and return its ordered increments.
    ///
    /// Dropping the stream aborts the underlying request.
    async fn stream_call(&self, request: ModelRequest) -> Result<ModelStream, ModelCallError>;

    /// Run a call to completion and return only the content text.
    async fn complete(&self, request: ModelRequest) -> Result<String, ModelCallError> {
        let mut stream = self.stream_call(request).await?;
        let mut text = String::new();
        while let Some(delta) = stream.next().await {
            if let ModelDelta::Content(chunk) = delta? {
                text.push_str(&chunk);
            }
        }
        Ok(text)
    }
}

pub struct OpenAiClient {
    http: reqwest::Client,
    config: Arc<LlmConfig>,
    retry_interval: Duration,
}

impl OpenAiClient {
    pub fn new(config: Arc<LlmConfig>) -> Result<Self, ModelCallError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ModelCallError::Connect(e.to_string()))?;
        Ok(Self {
            http,
            config,
            retry_interval: Duration::from_millis(500),
        })
    }

    /// Initial delay between connection retries.
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        )
    }

    fn request_body(&self, request: &ModelRequest) -> Value {
        json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "stream": true,
            "messages": request.messages(),
        })
    }

    async fn send_once(&self, url: &str, body: &Value) -> Result<reqwest::Response, ModelCallError> {
        let mut builder = self
            .http
            .post(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(body);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(ModelCallError::from_reqwest)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        Err(ModelCallError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// Connect with bounded exponential backoff. Only the connection is
    /// retried; once bytes flow, errors surface to the caller.
    async fn connect(&self, body: &Value) -> Result<reqwest::Response, ModelCallError> {
        let url = self.endpoint();
        let max_retries = self.config.max_retries;
        let attempts = AtomicU32::new(0);

        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.retry_interval)
            .with_max_interval(Duration::from_secs(8))
            .with_max_elapsed_time(Some(Duration::from_secs(
                self.config.request_timeout_secs,
            )))
            .build();

        let url = url.as_str();
        let attempts = &attempts;
        backoff::future::retry(policy, move || async move {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            match self.send_once(url, body).await {
                Ok(response) => Ok(response),
                Err(err) if err.is_retryable() && attempt < max_retries => {
                    warn!(attempt = attempt + 1, max_retries, error = %err, "model connection failed, retrying");
                    Err(backoff::Error::transient(err))
                }
                Err(err) => Err(backoff::Error::permanent(err)),
            }
        })
        .await
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn stream_call(&self, request: ModelRequest) -> Result<ModelStream, ModelCallError> {
        let body = self.request_body(&request);
        debug!(
            model = %self.config.model,
            has_image = request.image.is_some(),
            "starting model call"
        );

        let response = self.connect(&body).await?;
        Ok(decode_stream(response.bytes_stream().boxed()))
    }
}

struct DecodeState {
    bytes: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<ModelDelta, ModelCallError>>,
    done: bool,
}

impl DecodeState {
    fn absorb(&mut self, frames: Vec<String>) {
        for data in frames {
            if self.done {
                break;
            }
            if data.trim() == "[DONE]" {
                self.done = true;
                break;
            }
            match parse_chunk(&data) {
                Ok(deltas) => self.pending.extend(deltas.into_iter().map(Ok)),
                Err(err) => {
                    self.pending.push_back(Err(err));
                    self.done = true;
                }
            }
        }
    }
}

/// Turn an SSE byte stream into model deltas.
pub fn decode_stream(bytes: BoxStream<'static, reqwest::Result<Bytes>>) -> ModelStream {
    let state = DecodeState {
        bytes,
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        done: false,
    };

    futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                return Some((item, st));
            }
            if st.done {
                return None;
            }
            match st.bytes.next().await {
                Some(Ok(chunk)) => match st.decoder.push(&chunk) {
                    Ok(frames) => st.absorb(frames),
                    Err(err) => {
                        st.done = true;
                        st.pending.push_back(Err(err));
                    }
                },
                Some(Err(err)) => {
                    st.done = true;
                    let err = if err.is_timeout() {
                        ModelCallError::Timeout
                    } else {
                        ModelCallError::Stream(err.to_string())
                    };
                    st.pending.push_back(Err(err));
                }
                None => {
                    let frames = st.decoder.finish();
                    st.absorb(frames);
                    st.done = true;
                }
            }
        }
    })
    .boxed()
}

/// Incremental server-sent-events frame splitter.
///
/// Yields the joined `data:` payload of each complete frame. A frame that
/// grows past [`MAX_SSE_BUFFER_SIZE`] without a terminator is an error.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already searched for a frame terminator.
    scanned: usize,
}

impl SseDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, ModelCallError> {
        self.buffer.extend(chunk.iter().copied().filter(|&b| b != b'\r'));

        let mut frames = Vec::new();
        loop {
            // A terminator may straddle the previous scan boundary.
            let from = self.scanned.saturating_sub(1);
            let Some(rel) = self.buffer[from..].windows(2).position(|w| w == b"\n\n") else {
                self.scanned = self.buffer.len();
                break;
            };
            let pos = from + rel;
            let frame: Vec<u8> = self.buffer.drain(..pos + 2).collect();
            self.scanned = 0;
            if let Some(data) = Self::frame_data(&frame[..pos]) {
                frames.push(data);
            }
        }

        if self.buffer.len() > MAX_SSE_BUFFER_SIZE {
            warn!(
                buffered = self.buffer.len(),
                limit = MAX_SSE_BUFFER_SIZE,
                "upstream SSE frame exceeded buffer limit"
            );
            self.buffer.clear();
            self.scanned = 0;
            return Err(ModelCallError::Stream(format!(
                "SSE frame exceeded {MAX_SSE_BUFFER_SIZE} bytes without a terminator"
            )));
        }
        Ok(frames)
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Treat whatever is left as a final frame.
    pub fn finish(&mut self) -> Vec<String> {
        self.scanned = 0;
        let rest = std::mem::take(&mut self.buffer);
        Self::frame_data(&rest).into_iter().collect()
    }

    fn frame_data(frame: &[u8]) -> Option<String> {
        let text = String::from_utf8_lossy(frame);
        let lines: Vec<&str> = text
            .split('\n')
            .filter_map(|line| line.strip_prefix("data:"))
            .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
            .collect();
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Decode one `data:` payload into deltas. Reasoning precedes content.
pub fn parse_chunk(data: &str) -> Result<Vec<ModelDelta>, ModelCallError> {
    let chunk: ChatChunk =
        serde_json::from_str(data).map_err(|e| ModelCallError::Decode(e.to_string()))?;

    if let Some(error) = chunk.error {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(ModelCallError::Stream(message));
    }

    let mut deltas = Vec::new();
    for choice in chunk.choices {
        let delta = choice.delta;
        if let Some(reasoning) = delta.reasoning_content.or(delta.reasoning) {
            if !reasoning.is_empty() {
                deltas.push(ModelDelta::Reasoning(reasoning));
            }
        }
        if let Some(content) = delta.content {
            if !content.is_empty() {
                deltas.push(ModelDelta::Content(content));
            }
        }
    }
    Ok(deltas)
}
