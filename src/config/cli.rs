use std::path::PathBuf;

use clap::Parser;

use super::types::AppConfig;

/// Command line flags. Each one overrides the matching config file value.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "foodie")]
#[command(about = "Streaming food image analysis gateway")]
pub struct Cli {
    /// Path to a YAML configuration file
    #[arg(long, short = 'c', env = "FOODIE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Comma separated CORS origins, `*` for any
    #[arg(long, env = "CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    /// OpenAI-compatible API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "OPENAI_API_BASE")]
    pub api_base: Option<String>,

    /// Model name
    #[arg(long, env = "DEFAULT_MODEL")]
    pub model: Option<String>,

    /// Sampling temperature
    #[arg(long, env = "DEFAULT_TEMPERATURE")]
    pub temperature: Option<f32>,

    /// Model request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT")]
    pub request_timeout: Option<u64>,

    /// Connection retries before giving up on a model call
    #[arg(long, env = "MAX_RETRIES")]
    pub max_retries: Option<u32>,

    /// Marker scheme (sentinel, think_answer, bracket)
    #[arg(long, env = "MARKER_SCHEME")]
    pub marker_scheme: Option<String>,

    /// Log level or filter directive
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Emit JSON logs
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,

    /// Directory for rolling log files
    #[arg(long, env = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

impl Cli {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(origins) = &self.cors_origins {
            config.server.cors_origins = origins
                .iter()
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(key) = &self.api_key {
            config.llm.api_key = Some(key.clone());
        }
        if let Some(base) = &self.api_base {
            config.llm.api_base = base.clone();
        }
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        if let Some(temperature) = self.temperature {
            config.llm.temperature = temperature;
        }
        if let Some(timeout) = self.request_timeout {
            config.llm.request_timeout_secs = timeout;
        }
        if let Some(retries) = self.max_retries {
            config.llm.max_retries = retries;
        }
        if let Some(scheme) = &self.marker_scheme {
            config.parser.scheme = scheme.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.log_json {
            config.logging.json = true;
        }
        if let Some(dir) = &self.log_dir {
            config.logging.log_dir = Some(dir.clone());
        }
    }
}
