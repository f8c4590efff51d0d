//! Process configuration read from the environment.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use cobranca_providers::adapter::tls::build_client;
use cobranca_providers::{AdapterFactory, CredentialCodec};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::session::{MemorySessionStore, SessionCache, SessionOptions, SessionStore};

pub const ENCRYPTION_KEY_VAR: &str = "ENCRYPTION_KEY_HEX";
pub const REDIS_URL_VAR: &str = "REDIS_URL";
pub const SESSION_TTL_VAR: &str = "SESSION_TTL_SECONDS";
pub const SESSION_PREFIX_VAR: &str = "SESSION_KEY_PREFIX";
pub const HTTP_TIMEOUT_VAR: &str = "HTTP_TIMEOUT_SECONDS";
pub const LOG_FORMAT_VAR: &str = "LOG_FORMAT";

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Console log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(Error::config(format!(
                "{LOG_FORMAT_VAR} must be 'pretty' or 'json', got '{other}'"
            ))),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub codec: Arc<CredentialCodec>,
    pub redis_url: Option<String>,
    /// Process-wide session defaults; callers may override per request.
    pub session: SessionOptions,
    pub http_timeout: Duration,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("redis_url", &self.redis_url.as_ref().map(|_| "***"))
            .field("session", &self.session)
            .field("http_timeout", &self.http_timeout)
            .field("log_format", &self.log_format)
            .finish_non_exhaustive()
    }
}

fn parse_number<T: FromStr>(name: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(value) => value
            .parse()
            .map_err(|_| Error::config(format!("{name} must be a positive integer, got '{value}'"))),
        None => Ok(default),
    }
}

impl AppConfig {
    /// Load `.env` when present, then read the process environment.
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "Loaded .env file"),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(Error::config(format!("failed to read .env: {e}"))),
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let key_hex = lookup(ENCRYPTION_KEY_VAR)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::config(format!("{ENCRYPTION_KEY_VAR} is required")))?;
        if key_hex.len() != 64 {
            return Err(Error::config(format!(
                "{ENCRYPTION_KEY_VAR} must be 64 hex characters (32 bytes), got {}",
                key_hex.len()
            )));
        }
        let codec = CredentialCodec::from_hex(&key_hex)
            .map_err(|e| Error::config(format!("{ENCRYPTION_KEY_VAR}: {e}")))?;

        let mut session = SessionOptions::default();
        session.ttl_seconds = parse_number(SESSION_TTL_VAR, lookup(SESSION_TTL_VAR), session.ttl_seconds)?;
        session.key_prefix = lookup(SESSION_PREFIX_VAR).filter(|v| !v.trim().is_empty());
        session.validate()?;

        let timeout_secs = parse_number(HTTP_TIMEOUT_VAR, lookup(HTTP_TIMEOUT_VAR), DEFAULT_HTTP_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(Error::config(format!("{HTTP_TIMEOUT_VAR} must be at least 1")));
        }

        let log_format = lookup(LOG_FORMAT_VAR)
            .map(|v| v.parse())
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            codec: Arc::new(codec),
            redis_url: lookup(REDIS_URL_VAR).filter(|v| !v.trim().is_empty()),
            session,
            http_timeout: Duration::from_secs(timeout_secs),
            log_format,
        })
    }

    /// Adapter factory sharing one TLS client with the configured timeout.
    pub fn adapter_factory(&self) -> Result<AdapterFactory> {
        let client = build_client(None, self.http_timeout)?;
        Ok(AdapterFactory::new(client, self.codec.clone()).with_timeout(self.http_timeout))
    }

    /// Redis-backed store when `REDIS_URL` is set, in-memory otherwise.
    pub async fn session_store(&self) -> Result<Arc<dyn SessionStore>> {
        match &self.redis_url {
            #[cfg(feature = "redis-store")]
            Some(url) => {
                let store = crate::session::RedisSessionStore::connect(url).await?;
                info!("Using Redis session store");
                Ok(Arc::new(store))
            }
            #[cfg(not(feature = "redis-store"))]
            Some(_) => Err(Error::config(format!(
                "{REDIS_URL_VAR} is set but this build lacks the redis-store feature"
            ))),
            None => {
                info!("Using in-memory session store");
                Ok(Arc::new(MemorySessionStore::new()))
            }
        }
    }

    pub async fn session_cache(&self) -> Result<SessionCache> {
        let store = self.session_store().await?;
        Ok(SessionCache::new(store, self.codec.clone()))
    }
}
