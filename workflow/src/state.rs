//! Per-run shared state.

use std::{collections::HashMap, future::Future};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::error::NodeResult;

/// Inputs and partial results shared by every node of one run.
///
/// Leaf results are keyed by node name; each leaf writes only its own slot.
#[derive(Debug)]
pub struct RunState {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    image_source: String,
    image: OnceCell<String>,
    query: Option<String>,
    context: HashMap<String, String>,
    results: RwLock<Vec<(String, Option<String>)>>,
}

impl RunState {
    pub fn new(image_source: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            image_source: image_source.into(),
            image: OnceCell::new(),
            query: None,
            context: HashMap::new(),
            results: RwLock::new(Vec::new()),
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn image_source(&self) -> &str {
        &self.image_source
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn context(&self, key: &str) -> Option<&str> {
        self.context.get(key).map(String::as_str)
    }

    /// The resolved image reference, resolving it on first use.
    ///
    /// Concurrent callers wait for a single in-flight resolution. A failed
    /// resolution is not cached, so a later caller retries.
    pub async fn image<F, Fut>(&self, resolve: F) -> NodeResult<&str>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = NodeResult<String>>,
    {
        let source = self.image_source.clone();
        let image = self.image.get_or_try_init(|| resolve(source)).await?;
        Ok(image.as_str())
    }

    pub fn resolved_image(&self) -> Option<&str> {
        self.image.get().map(String::as_str)
    }

    /// Register every leaf with an empty slot, in graph order.
    pub fn seed_results<'a>(&self, names: impl IntoIterator<Item = &'a str>) {
        let mut results = self.results.write();
        for name in names {
            if !results.iter().any(|(n, _)| n == name) {
                results.push((name.to_string(), None));
            }
        }
    }

    pub fn record_result(&self, name: &str, text: String) {
        let mut results = self.results.write();
        match results.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = Some(text),
            None => results.push((name.to_string(), Some(text))),
        }
    }

    pub fn result(&self, name: &str) -> Option<String> {
        self.results
            .read()
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, slot)| slot.clone())
    }

    /// Snapshot of all slots in registration order.
    pub fn results(&self) -> Vec<(String, Option<String>)> {
        self.results.read().clone()
    }

    /// True once every registered slot has been filled.
    pub fn all_recorded(&self) -> bool {
        self.results.read().iter().all(|(_, slot)| slot.is_some())
    }
}
