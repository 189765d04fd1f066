use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "parley.toml",
    "config/parley.toml",
    "crates/config/parley.toml",
    "../parley.toml",
    "../config/parley.toml",
    "../crates/config/parley.toml",
];

pub const DEFAULT_AVATAR_URL: &str = "https://t0.gstatic.com/licensed-image?q=tbn:ANd9GcR2blyVMQtT2nXEr8UKiJ_8olhnnvEsPuV5exXRxt6smD4fkOm8xFnNKhhkTshGLTeNhOJ2GeI7SGf28VZzwHI";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub realtime: RealtimeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 7070,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://parley.db".to_string(),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "AuthConfig::default_session_ttl")]
    pub session_ttl_seconds: u64,
    #[serde(default = "AuthConfig::default_avatar_url")]
    pub default_avatar_url: String,
    #[serde(default)]
    pub github: GithubAuthConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_seconds: Self::default_session_ttl(),
            default_avatar_url: Self::default_avatar_url(),
            github: GithubAuthConfig::default(),
        }
    }
}

impl AuthConfig {
    fn default_session_ttl() -> u64 {
        86_400
    }

    fn default_avatar_url() -> String {
        DEFAULT_AVATAR_URL.to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GithubAuthConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Settings for the pub/sub relay that carries chatroom updates.
///
/// ```
/// use parley_config::RealtimeConfig;
///
/// let realtime = RealtimeConfig::default();
/// assert!(realtime.redis_url.is_none());
/// assert_eq!(realtime.channel_token_ttl_seconds, 3_600);
/// assert_eq!(realtime.buffer, 256);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Broker address. Without one, updates stay inside this process.
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "RealtimeConfig::default_channel_secret")]
    pub channel_secret: String,
    #[serde(default = "RealtimeConfig::default_channel_token_ttl")]
    pub channel_token_ttl_seconds: u64,
    #[serde(default = "RealtimeConfig::default_buffer")]
    pub buffer: usize,
}

impl RealtimeConfig {
    fn default_channel_secret() -> String {
        "change-me-parley-channel-secret".to_string()
    }

    const fn default_channel_token_ttl() -> u64 {
        3_600
    }

    const fn default_buffer() -> usize {
        256
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            channel_secret: Self::default_channel_secret(),
            channel_token_ttl_seconds: Self::default_channel_token_ttl(),
            buffer: Self::default_buffer(),
        }
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use parley_config::load;
///
/// std::env::remove_var("PARLEY_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let session_ttl_i64 = i64::try_from(defaults.auth.session_ttl_seconds).unwrap_or(i64::MAX);
    let channel_ttl_i64 =
        i64::try_from(defaults.realtime.channel_token_ttl_seconds).unwrap_or(i64::MAX);
    let buffer_i64 = i64::try_from(defaults.realtime.buffer).unwrap_or(i64::MAX);

    let mut builder = config::Config::builder()
        .set_default("http.address", defaults.http.address.clone())?
        .set_default("http.port", i64::from(defaults.http.port))?
        .set_default("database.url", defaults.database.url.clone())?
        .set_default(
            "database.max_connections",
            i64::from(defaults.database.max_connections),
        )?
        .set_default("auth.session_ttl_seconds", session_ttl_i64)?
        .set_default("auth.default_avatar_url", defaults.auth.default_avatar_url.clone())?
        .set_default("realtime.channel_secret", defaults.realtime.channel_secret.clone())?
        .set_default("realtime.channel_token_ttl_seconds", channel_ttl_i64)?
        .set_default("realtime.buffer", buffer_i64)?;

    let environment_overrides = config::Environment::with_prefix("PARLEY").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("PARLEY_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via PARLEY_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    if config.auth.session_ttl_seconds > i64::MAX as u64 {
        config.auth.session_ttl_seconds = i64::MAX as u64;
    }

    if config.realtime.buffer == 0 {
        config.realtime.buffer = RealtimeConfig::default_buffer();
    }

    debug!(http = ?config.http, database = ?config.database, "loaded backend configuration");
    Ok(config)
}
