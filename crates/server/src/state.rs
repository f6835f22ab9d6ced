//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::claude::{ClaudeClient, ClaudeError};
use crate::config::ServerConfig;

/// Application state shared across all handlers.
///
/// Cheap to clone; clones share the same pool and clients.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    pool: PgPool,
    claude: ClaudeClient,
}

impl AppState {
    /// Build the state, creating the Claude client from `config`.
    ///
    /// # Errors
    ///
    /// Returns `ClaudeError` if the Claude client cannot be configured.
    pub fn new(config: ServerConfig, pool: PgPool) -> Result<Self, ClaudeError> {
        let claude = ClaudeClient::new(config.claude())?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                claude,
            }),
        })
    }

    /// Server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Database pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Claude client.
    #[must_use]
    pub fn claude(&self) -> &ClaudeClient {
        &self.inner.claude
    }
}
