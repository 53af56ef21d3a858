use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use es4c_core::db::repository::SessionRepository;
use es4c_web::mail::mailer_from_config;
use es4c_web::AppState;
use tokio::net::TcpListener;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{info, warn};

use super::{connect_queue, load_config, open_repository};

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Run the `serve` command: start the web front end.
pub async fn run(config_path: &str, port: Option<u16>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    config.validate_web()?;

    let repo = open_repository(&config).await?;
    let queue = connect_queue(&config).await?;
    let mailer = mailer_from_config(&config.mail)?;
    if !config.mail.enabled {
        warn!("mail is disabled; verification emails are only logged");
    }

    let port = port.unwrap_or(config.web.port);
    let state = Arc::new(AppState {
        repo,
        publisher: Arc::new(queue),
        mailer: Arc::from(mailer),
        config,
    });

    let sweeper = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            match sweeper.repo.delete_expired_sessions().await {
                Ok(0) => {}
                Ok(n) => info!(removed = n, "expired sessions removed"),
                Err(e) => warn!(error = %e, "failed to remove expired sessions"),
            }
        }
    });

    // Add security headers
    let app = es4c_web::router(state)
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ));

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;

    println!("ES4C listening on http://{addr}");
    info!(addr = %addr, "starting web server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server shut down gracefully");
    Ok(())
}

pub(crate) async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for CTRL+C");
        std::future::pending::<()>().await;
    }
    info!("received shutdown signal");
}
