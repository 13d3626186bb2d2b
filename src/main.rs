// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;
use std::process::ExitCode;
use std::time::Duration;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tracing::{error, info, warn};

use relational_gatekeeper::{
    api::{router, DEPLOYED_ROUTES},
    auth::SessionValidationScheduler,
    config::{ConfigError, SecurityConfig, TlsPaths, HOST_ENV},
    error::BootstrapError,
    state::AppState,
    telemetry,
};

/// How long in-flight TLS connections may finish after shutdown starts.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Gatekeeper stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), BootstrapError> {
    // Must happen before any TLS operation.
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("A rustls crypto provider was already installed");
    }

    let config = SecurityConfig::from_env()?;
    let state = AppState::bootstrap(&config)?;
    state.filters.require_coverage(DEPLOYED_ROUTES.iter().copied())?;

    let sweeper = SessionValidationScheduler::new(state.security.sessions().clone())
        .with_interval(config.validation_interval)
        .spawn();

    let app = router(state);
    let served = match &config.tls {
        Some(paths) => serve_tls(app, &config, paths).await,
        None => serve_plain(app, &config).await,
    };

    sweeper.stop().await;
    info!("Gatekeeper shut down");
    served
}

async fn serve_plain(app: Router, config: &SecurityConfig) -> Result<(), BootstrapError> {
    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    info!(address = %config.bind_address(), "Listening on http (docs at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn serve_tls(app: Router, config: &SecurityConfig, paths: &TlsPaths) -> Result<(), BootstrapError> {
    let addr: SocketAddr = config.bind_address().parse().map_err(|e: std::net::AddrParseError| {
        ConfigError::Invalid {
            var: HOST_ENV,
            value: config.host.clone(),
            reason: e.to_string(),
        }
    })?;
    let tls = RustlsConfig::from_pem_file(&paths.cert, &paths.key)
        .await
        .map_err(|e| BootstrapError::Tls(e.to_string()))?;
    info!(address = %addr, "Listening on https (docs at /docs)");

    let handle = axum_server::Handle::new();
    let server = axum_server::bind_rustls(addr, tls).handle(handle.clone());
    tokio::spawn(async move {
        shutdown_signal().await;
        handle.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
    });

    server.serve(app.into_make_service()).await?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "Could not listen for ctrl-c, running until killed");
            std::future::pending::<()>().await;
        }
    }
}
