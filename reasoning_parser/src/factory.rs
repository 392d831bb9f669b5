// Factory and registry for creating marker scheme parsers.

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;
use tracing::debug;

use crate::{
    parsers::{BaseReasoningParser, BracketParser, SentinelParser, ThinkAnswerParser},
    traits::{ParseError, ParserConfig, ParserResult, ReasoningParser},
};

/// Scheme used when nothing else is configured.
pub const DEFAULT_SCHEME: &str = "sentinel";

type ParserCreator = Arc<dyn Fn() -> Box<dyn ReasoningParser> + Send + Sync>;

/// Registry of named parser constructors.
#[derive(Clone, Default)]
pub struct ParserRegistry {
    creators: Arc<RwLock<HashMap<String, ParserCreator>>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under `name`, replacing any previous one.
    pub fn register_parser<F>(&self, name: &str, creator: F)
    where
        F: Fn() -> Box<dyn ReasoningParser> + Send + Sync + 'static,
    {
        self.creators
            .write()
            .insert(name.to_string(), Arc::new(creator));
    }

    /// Create a fresh parser instance for `name`.
    pub fn create_parser(&self, name: &str) -> Option<Box<dyn ReasoningParser>> {
        let creator = self.creators.read().get(name).cloned()?;
        Some(creator())
    }

    pub fn has_parser(&self, name: &str) -> bool {
        self.creators.read().contains_key(name)
    }

    /// Registered scheme names, sorted.
    pub fn list_parsers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.creators.read().keys().cloned().collect();
        names.sort();
        names
    }
}

/// Creates a new, independent parser per stream.
///
/// Parsers are stateful, so every model call gets its own instance.
#[derive(Clone)]
pub struct ParserFactory {
    registry: ParserRegistry,
}

impl ParserFactory {
    /// Factory with the built-in schemes registered.
    pub fn new() -> Self {
        let registry = ParserRegistry::new();

        registry.register_parser("sentinel", || Box::new(SentinelParser::new()));
        registry.register_parser("think_answer", || Box::new(ThinkAnswerParser::new()));
        registry.register_parser("bracket", || Box::new(BracketParser::new()));

        Self { registry }
    }

    pub fn create(&self, scheme: &str) -> ParserResult<Box<dyn ReasoningParser>> {
        self.registry.create_parser(scheme).ok_or_else(|| {
            debug!(scheme, "requested unknown marker scheme");
            ParseError::UnknownScheme(scheme.to_string())
        })
    }

    /// Build a parser for caller-supplied marker pairs.
    pub fn create_from_config(
        &self,
        config: ParserConfig,
    ) -> ParserResult<Box<dyn ReasoningParser>> {
        let parser = BaseReasoningParser::new(config)?.with_model_type("custom");
        Ok(Box::new(parser))
    }

    /// Register a validated custom scheme under `name`.
    pub fn register_config(&self, name: &str, config: ParserConfig) -> ParserResult<()> {
        let template = BaseReasoningParser::new(config)?.with_model_type(name);
        self.registry
            .register_parser(name, move || Box::new(template.clone()));
        Ok(())
    }

    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }
}

impl Default for ParserFactory {
    fn default() -> Self {
        Self::new()
    }
}
