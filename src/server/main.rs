use std::sync::Arc;

use despacho::config::init_config;
use despacho::errors::{DespachoError, DespachoResult};
use despacho::gateway::AsaasGateway;
use despacho::notify::notifier_from_config;
use despacho::server::{build_router, AppState, AuthState, Database};
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("despacho_server: {e}");
        std::process::exit(1);
    }
}

async fn run() -> DespachoResult<()> {
    let config = init_config()?;

    if config.logging.enabled {
        let level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
        tracing_subscriber::fmt().with_max_level(level).init();
    }

    let db = Database::new().await?;
    db.migrate().await?;

    if config.gateway.api_key.is_empty() {
        warn!("gateway.api_key is empty; charge endpoints will answer 503");
    }
    if config.gateway.webhook_token.is_none() {
        warn!("gateway.webhook_token is not set; webhook requests are not authenticated");
    }
    if config.notify.smtp_host().is_none() {
        warn!("notify.smtp_host is not set; invoice emails are only logged");
    }

    let state = AppState::new(
        db,
        Arc::new(AsaasGateway::new(&config.gateway)),
        notifier_from_config(&config.notify)?,
        Arc::new(config.billing.clock()?),
        AuthState::from_config(&config.auth)?,
    )
    .with_billing(config.billing.clone())
    .with_webhook_token(config.gateway.webhook_token.clone());

    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| DespachoError::ServerError(format!("failed to bind {addr}: {e}")))?;
    info!("Listening on http://{addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| DespachoError::ServerError(e.to_string()))
}
