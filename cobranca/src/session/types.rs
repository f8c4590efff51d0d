use chrono::{DateTime, Utc};
use cobranca_providers::ProviderId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

pub const DEFAULT_SESSION_TTL_SECONDS: u64 = 8 * 60 * 60;
pub const MAX_SESSION_TTL_SECONDS: u64 = 24 * 60 * 60;

/// Persisted session, exactly as stored in the key-value store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCacheEntry {
    pub session_id: String,
    pub provider_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub credentials_encrypted: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_config_encrypted: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl SessionCacheEntry {
    /// Whole seconds until expiry, never negative.
    pub fn expires_in_seconds(&self) -> u64 {
        (self.expires_at - Utc::now()).num_seconds().max(0) as u64
    }
}

/// Per-caller cache behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOptions {
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,
    #[serde(default, alias = "redisKeyPrefix", skip_serializing_if = "Option::is_none")]
    pub key_prefix: Option<String>,
}

fn default_ttl() -> u64 {
    DEFAULT_SESSION_TTL_SECONDS
}

fn default_cache_enabled() -> bool {
    true
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            cache_enabled: true,
            key_prefix: None,
        }
    }
}

impl SessionOptions {
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_SESSION_TTL_SECONDS).contains(&self.ttl_seconds) {
            return Err(Error::validation(format!(
                "session ttl must be between 1 and {MAX_SESSION_TTL_SECONDS} seconds, got {}",
                self.ttl_seconds
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub provider_id: ProviderId,
    pub tenant_id: Option<String>,
    /// Plaintext credentials; sealed before they are stored.
    pub credentials: Value,
    pub context: Option<Value>,
    pub options: SessionOptions,
    pub force_refresh: bool,
}

impl SessionRequest {
    pub fn new(provider_id: ProviderId, credentials: Value) -> Self {
        Self {
            provider_id,
            tenant_id: None,
            credentials,
            context: None,
            options: SessionOptions::default(),
            force_refresh: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub entry: SessionCacheEntry,
    pub cache_hit: bool,
}
