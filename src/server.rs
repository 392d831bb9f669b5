//! Application wiring and the HTTP server loop.

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::{
    agents::{AgentDeps, Orchestrator},
    config::{AppConfig, ConfigError, ServerConfig},
    core::{HttpImageResolver, ImageFetchError, ModelCallError, OpenAiClient},
    routers,
};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to build model client: {0}")]
    ModelClient(#[from] ModelCallError),

    #[error("failed to build image resolver: {0}")]
    ImageResolver(#[from] ImageFetchError),

    #[error("marker scheme unavailable: {0}")]
    Parser(#[from] reasoning_parser::ParseError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, config: Arc<AppConfig>) -> Self {
        Self {
            orchestrator,
            config,
        }
    }

    /// Build the production collaborators described by `config`.
    pub fn from_config(config: Arc<AppConfig>) -> Result<Self, ServerError> {
        config.validate()?;

        let client = OpenAiClient::new(Arc::new(config.llm.clone()))?;
        let resolver = HttpImageResolver::new(&config.image)?;
        let (parsers, scheme) = config.parser_factory()?;
        let deps = AgentDeps::new(Arc::new(client), Arc::new(resolver), parsers, scheme)?;

        info!(
            model = %config.llm.model,
            api_base = %config.llm.api_base,
            scheme = deps.scheme(),
            "analysis pipeline ready"
        );

        let orchestrator = Orchestrator::new(deps, config.server.event_capacity);
        Ok(Self::new(Arc::new(orchestrator), config))
    }
}

pub fn build_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server);

    routers::food::routes()
        .fallback(|| async { routers::error::not_found("not_found", "no such route") })
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if server.cors_origins.is_empty() || server.allows_any_origin() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Bind and serve until Ctrl-C or SIGTERM.
pub async fn serve(state: AppState) -> Result<(), ServerError> {
    let addr = state.config.server.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
    info!(addr = %addr, "listening");

    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)?;

    info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, draining connections");
}
