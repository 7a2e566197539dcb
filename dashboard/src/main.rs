// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use std::sync::Arc;

use dashboard::config::{Backend, Config};
use dashboard::gateway;
use dashboard::routes;
use dashboard::view::app::AppRoot;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting up the dashboard...");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    let gateways = match gateway::connect(&config.backend).await {
        Ok(gateways) => {
            // The hosted gateways announce their own endpoint.
            if let Backend::Local { database_url } = &config.backend {
                tracing::info!("Using local database {}.", database_url);
            }
            gateways
        }
        Err(e) => {
            tracing::error!("Failed to connect to the backend: {:?}", e);
            std::process::exit(1);
        }
    };

    let app = Arc::new(AppRoot::new(gateways.session, gateways.data));

    // The page shows "Loading" until the initial session check answers.
    let mounting = Arc::clone(&app);
    tokio::spawn(async move { mounting.mount().await });

    let router = routes::create_router(Arc::clone(&app));

    let listener = match tokio::net::TcpListener::bind(config.listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.listen_addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!("The dashboard listens on http://{}", config.listen_addr);

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", e);
    }

    app.unmount().await;
    tracing::info!("Dashboard stopped.");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
