//! chatgate server binary
//!
//! Reads configuration from the environment, builds the shared state and
//! serves the proxy endpoint until Ctrl+C.

use std::net::SocketAddr;

use chatgate_server::{app, build_state, Config};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let addr = config.socket_addr()?;
    info!("Credentials: {:?}", config.credentials);

    let state = build_state(config).await?;
    info!(
        "Serving models {:?} (fallback: {:?})",
        state.dispatcher.router().models(),
        state.dispatcher.fallback_model()
    );

    let listener = TcpListener::bind(addr).await?;
    info!("chatgate listening on {}", addr);

    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("chatgate stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
