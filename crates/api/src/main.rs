//! Prescripto API server binary entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use prescripto_common::config::AppConfig;
use prescripto_notifier::{Dispatcher, MailerConfig, SmtpMailTransport};

use prescripto_api::routes::create_router;
use prescripto_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("prescripto_api=debug,prescripto_notifier=debug,tower_http=debug")
        }))
        .init();

    tracing::info!("Starting Prescripto API server...");

    // Load configuration
    let config = AppConfig::from_env()?;
    let mailer_config = MailerConfig::from(&config);
    if let Err(e) = mailer_config.credentials() {
        tracing::warn!(error = %e, "Emails will be rejected until credentials are set");
    }

    // Build the SMTP transport and dispatcher
    let transport = SmtpMailTransport::new(&mailer_config)?;
    let dispatcher = Dispatcher::new(mailer_config, Arc::new(transport));

    // Build application state
    let state = AppState::new(dispatcher, config.clone());

    // Build router
    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Received shutdown signal, stopping gracefully...");
        })
        .await?;

    tracing::info!("Prescripto API server stopped.");
    Ok(())
}
