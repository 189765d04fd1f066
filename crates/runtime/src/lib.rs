use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use parley_auth::Authenticator;
use parley_config::{AppConfig, RealtimeConfig};
use parley_database::{initialize_database, SqlitePool};
use parley_realtime::{Broadcaster, LocalBroadcaster, RedisBroadcaster};
use tracing::{info, warn};

const REDIS_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub mod telemetry {
    use anyhow::Result;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    const DEFAULT_FILTER: &str = "info,sqlx=warn";

    /// Install the global fmt subscriber, filtered by `RUST_LOG` when set.
    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let subscriber = SubscriberBuilder::default()
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

/// Which relay carries chatroom events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerKind {
    Redis,
    Local,
}

#[derive(Clone)]
pub struct BackendServices {
    pub db_pool: SqlitePool,
    pub authenticator: Authenticator,
    pub broadcaster: Arc<dyn Broadcaster>,
    pub broker: BrokerKind,
}

impl BackendServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let db_pool = initialize_database(&config.database)
            .await
            .context("failed to initialise database")?;

        let authenticator = Authenticator::new(db_pool.clone(), config.auth.clone());
        if !authenticator.github_enabled() {
            info!("github sign-in disabled, no client credentials configured");
        }

        let (broadcaster, broker) = select_broadcaster(&config.realtime).await;
        info!(broker = ?broker, "realtime relay ready");

        Ok(Self {
            db_pool,
            authenticator,
            broadcaster,
            broker,
        })
    }
}

/// Redis when configured and reachable, otherwise an in-process relay.
async fn select_broadcaster(config: &RealtimeConfig) -> (Arc<dyn Broadcaster>, BrokerKind) {
    let local = || -> (Arc<dyn Broadcaster>, BrokerKind) {
        (
            Arc::new(LocalBroadcaster::new(config.buffer.max(1))),
            BrokerKind::Local,
        )
    };

    let Some(url) = config.redis_url.as_deref() else {
        return local();
    };

    match tokio::time::timeout(REDIS_CONNECT_TIMEOUT, RedisBroadcaster::connect(url)).await {
        Ok(Ok(broadcaster)) => {
            info!("redis connection established");
            (Arc::new(broadcaster), BrokerKind::Redis)
        }
        Ok(Err(error)) => {
            warn!(%error, "failed to connect to redis, events stay in this process");
            local()
        }
        Err(_) => {
            warn!(
                timeout_secs = REDIS_CONNECT_TIMEOUT.as_secs(),
                "redis connection timed out, events stay in this process"
            );
            local()
        }
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
