use std::sync::Arc;

use crate::config::Config;
use crate::db::Store;
use crate::domain::{OperatorStore, PasswordHasher};
use crate::services::{AuthService, OperatorAuthService, RateLimiter, TokenIssuer};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub tokens: Arc<TokenIssuer>,

    pub auth_service: Arc<dyn AuthService>,

    pub rate_limiter: Arc<RateLimiter>,
}

impl SharedState {
    /// Connect the SQL store named by `general.database_url` and wire the services.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        config.validate()?;

        let store = Store::with_pool_options(
            &config.general.database_url,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        Self::with_store(config, Arc::new(store.operators()))
    }

    /// Wire the services around an already-built operator store.
    pub fn with_store(config: Config, store: Arc<dyn OperatorStore>) -> anyhow::Result<Self> {
        config.validate()?;

        let tokens = Arc::new(TokenIssuer::new(&config.security.jwt_secret)?);
        let hasher = PasswordHasher::from_config(&config.security)?;

        let auth_service = Arc::new(OperatorAuthService::new(
            store,
            hasher,
            tokens.clone(),
        )) as Arc<dyn AuthService>;

        let rate_limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));

        Ok(Self {
            config: Arc::new(config),
            tokens,
            auth_service,
            rate_limiter,
        })
    }
}
