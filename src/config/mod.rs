//! Layered configuration: defaults, an optional YAML file, then CLI flags
//! (each with an environment variable fallback).

mod cli;
mod types;

use std::path::{Path, PathBuf};

pub use cli::Cli;
use reasoning_parser::ParserFactory;
use thiserror::Error;
pub use types::{
    AppConfig, CustomMarkers, ImageConfig, LlmConfig, LoggingConfig, ParserSettings, ServerConfig,
};

/// Scheme name under which custom markers are registered.
pub const CUSTOM_SCHEME: &str = "custom";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("invalid marker configuration: {0}")]
    Parser(#[from] reasoning_parser::ParseError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

impl AppConfig {
    /// Defaults, overlaid with the YAML file at `path` if given.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_yaml(&content)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_yaml(content: &str) -> ConfigResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be non-zero".into()));
        }
        if self.server.event_capacity == 0 {
            return Err(ConfigError::Invalid(
                "server.event_capacity must be at least 1".into(),
            ));
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Invalid("llm.model must not be empty".into()));
        }
        if url::Url::parse(&self.llm.api_base).is_err() {
            return Err(ConfigError::Invalid(format!(
                "llm.api_base is not a valid URL: {}",
                self.llm.api_base
            )));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Invalid(
                "llm.temperature must be between 0 and 2".into(),
            ));
        }
        if self.llm.request_timeout_secs == 0 || self.image.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be non-zero".into()));
        }

        self.parser_factory()?;
        Ok(())
    }

    /// Parser factory for this configuration and the scheme name to request from it.
    pub fn parser_factory(&self) -> ConfigResult<(ParserFactory, String)> {
        let factory = ParserFactory::new();
        match &self.parser.custom {
            Some(custom) => {
                factory.register_config(CUSTOM_SCHEME, custom.to_parser_config())?;
                Ok((factory, CUSTOM_SCHEME.to_string()))
            }
            None => {
                if !factory.registry().has_parser(&self.parser.scheme) {
                    return Err(ConfigError::Parser(
                        reasoning_parser::ParseError::UnknownScheme(self.parser.scheme.clone()),
                    ));
                }
                Ok((factory, self.parser.scheme.clone()))
            }
        }
    }
}
