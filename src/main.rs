use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use foodie::{
    config::{AppConfig, Cli},
    observability::init_logging,
    server::{self, AppState},
};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    cli.apply(&mut config);
    config.validate().context("validating configuration")?;

    let _log_guard = init_logging(&config.logging).context("initialising logging")?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        bind = %config.server.bind_address(),
        "starting foodie gateway"
    );

    let state = AppState::from_config(Arc::new(config)).context("building application")?;
    server::serve(state).await?;
    Ok(())
}
