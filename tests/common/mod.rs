//! Shared fixtures: scripted model client, fake image resolver, event helpers.
#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use foodie::{
    agents::{AgentDeps, Orchestrator},
    core::{
        ImageFetchError, ImageRef, ImageResolver, ModelCallError, ModelClient, ModelDelta,
        ModelRequest, ModelStream,
    },
};
use futures::stream;
use reasoning_parser::ParserFactory;
use serde_json::Value;
use wfaas::Event;

pub const TEST_IMAGE: &str = "data:image/png;base64,iVBORw0KGgo=";
pub const MISSING_IMAGE: &str = "/no/such/dish.jpg";

/// What the client answers for requests whose system prompt matches a rule.
#[derive(Debug, Clone)]
pub enum Script {
    /// Content deltas in order.
    Chunks(Vec<String>),
    /// Arbitrary deltas in order.
    Deltas(Vec<ModelDelta>),
    /// The user turn wrapped in answer markers, split into small chunks.
    EchoUser { open: String, close: String },
    /// Connection failure.
    Fail(String),
}

impl Script {
    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Script::Chunks(chunks.into_iter().map(Into::into).collect())
    }

    /// Split `text` into pieces of at most `size` chars.
    pub fn split(text: &str, size: usize) -> Self {
        let chars: Vec<char> = text.chars().collect();
        Script::Chunks(chars.chunks(size).map(|c| c.iter().collect()).collect())
    }
}

#[derive(Default)]
pub struct ScriptedClient {
    rules: Vec<(String, Script)>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests whose system prompt contains `needle` with `script`.
    pub fn on(mut self, needle: impl Into<String>, script: Script) -> Self {
        self.rules.push((needle.into(), script));
        self
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_matching(&self, needle: &str) -> Option<ModelRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.system_prompt.contains(needle))
            .cloned()
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    async fn stream_call(&self, request: ModelRequest) -> Result<ModelStream, ModelCallError> {
        self.requests.lock().unwrap().push(request.clone());

        let script = self
            .rules
            .iter()
            .find(|(needle, _)| request.system_prompt.contains(needle.as_str()))
            .map(|(_, script)| script.clone())
            .unwrap_or(Script::Chunks(Vec::new()));

        let deltas = match script {
            Script::Chunks(chunks) => chunks.into_iter().map(ModelDelta::Content).collect(),
            Script::Deltas(deltas) => deltas,
            Script::EchoUser { open, close } => {
                let text = format!("{open}{}{close}", request.user_text);
                let chars: Vec<char> = text.chars().collect();
                chars
                    .chunks(7)
                    .map(|c| ModelDelta::Content(c.iter().collect()))
                    .collect()
            }
            Script::Fail(message) => return Err(ModelCallError::Connect(message)),
        };

        Ok(Box::pin(stream::iter(deltas.into_iter().map(Ok))))
    }
}

/// Resolves every source to [`TEST_IMAGE`] except [`MISSING_IMAGE`].
#[derive(Default)]
pub struct FakeResolver {
    calls: AtomicUsize,
}

impl FakeResolver {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageResolver for FakeResolver {
    async fn resolve(&self, source: &str) -> Result<ImageRef, ImageFetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if source == MISSING_IMAGE {
            return Err(ImageFetchError::NotFound(source.to_string()));
        }
        Ok(ImageRef::new(TEST_IMAGE))
    }
}

pub struct Harness {
    pub client: Arc<ScriptedClient>,
    pub resolver: Arc<FakeResolver>,
    pub orchestrator: Orchestrator,
}

/// An orchestrator over `client` using the bracket marker scheme.
pub fn harness(client: ScriptedClient) -> Harness {
    harness_with_scheme(client, "bracket")
}

pub fn harness_with_scheme(client: ScriptedClient, scheme: &str) -> Harness {
    let client = Arc::new(client);
    let resolver = Arc::new(FakeResolver::default());
    let deps = AgentDeps::new(
        client.clone(),
        resolver.clone(),
        ParserFactory::new(),
        scheme,
    )
    .expect("scheme is registered");
    Harness {
        client,
        resolver,
        orchestrator: Orchestrator::new(deps, 16),
    }
}

pub fn thoughts(events: &[Event]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Thought(t) => Some(t.as_str()),
            _ => None,
        })
        .collect()
}

pub fn messages(events: &[Event]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Message(t) => Some(t.as_str()),
            _ => None,
        })
        .collect()
}

pub fn payloads(events: &[Event]) -> Vec<Value> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::StructuredPayload(v) => Some(v.clone()),
            _ => None,
        })
        .collect()
}

pub fn errors(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Error(t) => Some(t.clone()),
            _ => None,
        })
        .collect()
}
