pub mod auth;
pub mod error;
pub mod extract;
pub mod loaders;
pub mod mailer;
pub mod middleware;
pub mod posts;
pub mod routes;
pub mod session;
pub mod validation;
pub mod votes;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use tracing::error;

use linkvote_db::Database;

use crate::error::ApiError;
use crate::mailer::Mailer;
use crate::session::SessionSettings;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub sessions: SessionSettings,
    /// Base URL of the web client, used to build password reset links.
    pub frontend_url: String,
    pub mailer: Arc<dyn Mailer>,
}

/// Run blocking work (SQLite, argon2) off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal
    })?
}

/// Run a database call off the async runtime.
pub(crate) async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> linkvote_db::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    blocking(move || f(&state.db).map_err(ApiError::from)).await
}
