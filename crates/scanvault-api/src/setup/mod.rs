//! Application setup and initialization.

pub mod routes;
pub mod server;
pub mod services;

use anyhow::Result;
use axum::Router;
use tracing_subscriber::{
    fmt::format::Format, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use scanvault_core::Config;
use scanvault_worker::ScanWorker;

/// Console tracing: compact format, `RUST_LOG`-style filtering via `EnvFilter`.
pub fn init_tracing() {
    let console_fmt = tracing_subscriber::fmt::layer().event_format(
        Format::default()
            .compact()
            .with_target(false)
            .without_time(),
    );
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scanvault=debug,tower_http=debug".into()),
        )
        .with(console_fmt)
        .init();
}

/// Initialize stores, services, the scan worker, and the router.
pub async fn initialize_app(config: Config) -> Result<(Router, ScanWorker)> {
    config.validate()?;

    let (state, worker) = services::initialize_services(config).await?;
    let router = routes::build_router(state);

    Ok((router, worker))
}
