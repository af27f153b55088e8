mod config;

use std::sync::Arc;

use axum::http::{HeaderValue, Method, header::CONTENT_TYPE};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use linkvote_api::mailer::LogMailer;
use linkvote_api::session::SessionSettings;
use linkvote_api::{AppState, AppStateInner, routes};
use linkvote_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "linkvote=debug,linkvote_api=debug,linkvote_db=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;
    let db = Database::open(&config.db_path)?;

    let state: AppState = Arc::new(AppStateInner {
        db,
        sessions: SessionSettings {
            ttl: config.session_ttl,
            cookie_secure: config.cookie_secure,
        },
        frontend_url: config.frontend_url.clone(),
        mailer: Arc::new(LogMailer),
    });

    let app = routes::router(state)
        .layer(cors_layer(&config)?)
        .layer(TraceLayer::new_for_http());

    let addr = config.addr()?;
    info!("Linkvote server listening on {}", addr);
    info!("Sessions last {} seconds", config.session_ttl.num_seconds());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Cookies only cross origins with credentialed CORS, which needs an explicit origin.
fn cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let Some(origin) = &config.cors_origin else {
        warn!("LINKVOTE_CORS_ORIGIN unset, allowing any origin without credentials");
        return Ok(CorsLayer::permissive());
    };

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::exact(HeaderValue::from_str(origin)?))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true))
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => tokio::select! {
                _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
            },
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
